use deposit_core::{parse_amount, Deposit, DepositMade, DepositValidationError};
use rust_decimal::Decimal;
use uuid::Uuid;

#[test]
fn deposit_new_binds_user_and_amount() {
    let user_id = Uuid::new_v4();
    let amount = parse_amount("100.00").unwrap();

    let deposit = Deposit::new(user_id, amount);

    assert!(!deposit.id.is_nil());
    assert_eq!(deposit.user_id, user_id);
    assert_eq!(deposit.amount, amount);
    assert!(deposit.validate().is_ok());
}

#[test]
fn deposit_serialization_keeps_amount_exact() {
    let id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let user_id = Uuid::parse_str("aaaaaaaa-bbbb-4ccc-8ddd-eeeeeeeeeeee").unwrap();
    let deposit = Deposit::with_id(id, user_id, parse_amount("100.10").unwrap(), 1_700_000_000_000)
        .unwrap();

    let json = serde_json::to_value(&deposit).unwrap();
    assert_eq!(json["id"], id.to_string());
    assert_eq!(json["user_id"], user_id.to_string());
    assert_eq!(json["amount"], "100.10");
    assert_eq!(json["created_at_ms"], 1_700_000_000_000_i64);

    let decoded: Deposit = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, deposit);
}

#[test]
fn deserialize_rejects_non_positive_amount() {
    let value = serde_json::json!({
        "id": "11111111-2222-4333-8444-555555555555",
        "user_id": "aaaaaaaa-bbbb-4ccc-8ddd-eeeeeeeeeeee",
        "amount": "-5.00",
        "created_at_ms": 1
    });

    let err = serde_json::from_value::<Deposit>(value).unwrap_err();
    assert!(
        err.to_string().contains("must be positive"),
        "unexpected error: {err}"
    );
}

#[test]
fn with_id_rejects_nil_identifiers() {
    let err = Deposit::with_id(Uuid::nil(), Uuid::new_v4(), Decimal::ONE, 0).unwrap_err();
    assert_eq!(err, DepositValidationError::NilDepositId);

    let err = Deposit::with_id(Uuid::new_v4(), Uuid::nil(), Decimal::ONE, 0).unwrap_err();
    assert_eq!(err, DepositValidationError::NilUserId);
}

#[test]
fn deposit_made_carries_only_the_deposit_id() {
    let deposit = Deposit::new(Uuid::new_v4(), Decimal::new(2_500, 2));
    let event = DepositMade::for_deposit(&deposit);

    let json = serde_json::to_value(event).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert_eq!(json["deposit_id"], deposit.id.to_string());
}
