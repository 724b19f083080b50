use deposit_core::db::{open_db, open_db_in_memory};
use deposit_core::{
    parse_amount, CancellationToken, Deposit, DepositId, DepositListQuery, DepositMade,
    DepositRepository, DepositService, DepositServiceConfig, DepositValidationError, EventBus,
    InProcessEventBus, PublishError, PublishResult, PublishRetryPolicy, RepoError, RepoResult,
    SqliteDepositRepository, SubmitDepositRequest, SubmitError, UserId,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Bus that fails its first `failures` attempts and records every attempt.
#[derive(Default)]
struct ScriptedBus {
    failures: u32,
    calls: AtomicU32,
    attempted: Mutex<Vec<DepositMade>>,
}

impl ScriptedBus {
    fn failing_first(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn attempted(&self) -> Vec<DepositMade> {
        self.attempted.lock().unwrap().clone()
    }
}

impl EventBus for ScriptedBus {
    fn publish(&self, event: &DepositMade) -> PublishResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.attempted.lock().unwrap().push(*event);
        if call <= self.failures {
            return Err(PublishError::Rejected(format!("broker down on call {call}")));
        }
        Ok(())
    }
}

/// Store whose commit always fails while reads go to a real repository.
struct FailingCommitRepository<'conn> {
    inner: SqliteDepositRepository<'conn>,
}

impl DepositRepository for FailingCommitRepository<'_> {
    fn create_deposit(&self, _deposit: &Deposit) -> RepoResult<DepositId> {
        Err(RepoError::InvalidData("commit failed".to_string()))
    }

    fn get_deposit(&self, id: DepositId) -> RepoResult<Option<Deposit>> {
        self.inner.get_deposit(id)
    }

    fn list_deposits(&self, query: &DepositListQuery) -> RepoResult<Vec<Deposit>> {
        self.inner.list_deposits(query)
    }

    fn count_deposits(&self, user_id: Option<UserId>) -> RepoResult<u64> {
        self.inner.count_deposits(user_id)
    }
}

fn immediate_config() -> DepositServiceConfig {
    DepositServiceConfig {
        retry: PublishRetryPolicy::immediate(8),
    }
}

fn request(user_id: UserId, amount: &str) -> SubmitDepositRequest {
    SubmitDepositRequest::new(user_id, parse_amount(amount).unwrap())
}

#[test]
fn successful_submission_stores_exactly_one_matching_deposit_and_publishes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = ScriptedBus::default();
    let service = DepositService::with_config(&repo, &bus, immediate_config());
    let user_id = Uuid::new_v4();

    let id = service.submit_deposit(&request(user_id, "100.00")).unwrap();

    let stored = repo.list_deposits(&DepositListQuery::default()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].user_id, user_id);
    assert_eq!(stored[0].amount, parse_amount("100.00").unwrap());
    assert_eq!(bus.attempted(), vec![DepositMade { deposit_id: id }]);
}

#[test]
fn commit_failure_returns_error_and_never_publishes() {
    let conn = open_db_in_memory().unwrap();
    let repo = FailingCommitRepository {
        inner: SqliteDepositRepository::try_new(&conn).unwrap(),
    };
    let bus = ScriptedBus::default();
    let service = DepositService::with_config(&repo, &bus, immediate_config());

    let err = service
        .submit_deposit(&request(Uuid::new_v4(), "42.00"))
        .unwrap_err();

    assert!(matches!(err, SubmitError::Persistence(_)));
    assert_eq!(repo.count_deposits(None).unwrap(), 0);
    assert_eq!(bus.calls(), 0);
}

#[test]
fn aborted_sqlite_write_returns_error_with_zero_deposits() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_deposits BEFORE INSERT ON deposits
         BEGIN
             SELECT RAISE(ABORT, 'storage offline');
         END;",
    )
    .unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = ScriptedBus::default();
    let service = DepositService::with_config(&repo, &bus, immediate_config());

    let result = service.submit_deposit(&request(Uuid::new_v4(), "10.00"));

    match result {
        Err(SubmitError::Persistence(RepoError::Db(_))) => {}
        other => panic!("expected persistence error, got {other:?}"),
    }
    assert_eq!(repo.count_deposits(None).unwrap(), 0);
    assert_eq!(bus.calls(), 0);
}

#[test]
fn publish_succeeding_on_eighth_attempt_still_returns_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = ScriptedBus::failing_first(7);
    let service = DepositService::with_config(&repo, &bus, immediate_config());

    let id = service
        .submit_deposit(&request(Uuid::new_v4(), "100.00"))
        .unwrap();

    assert_eq!(bus.calls(), 8);
    assert!(bus
        .attempted()
        .iter()
        .all(|event| event.deposit_id == id));
    assert!(repo.get_deposit(id).unwrap().is_some());
}

#[test]
fn publish_failing_all_attempts_is_swallowed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = ScriptedBus::failing_first(u32::MAX);
    let service = DepositService::with_config(&repo, &bus, immediate_config());

    let id = service
        .submit_deposit(&request(Uuid::new_v4(), "100.00"))
        .unwrap();

    assert_eq!(bus.calls(), 8);
    let stored = repo.get_deposit(id).unwrap().unwrap();
    assert_eq!(stored.amount, parse_amount("100.00").unwrap());
}

#[test]
fn default_policy_also_budgets_eight_attempts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = ScriptedBus::failing_first(u32::MAX);
    let service = DepositService::new(&repo, &bus);

    service
        .submit_deposit(&request(Uuid::new_v4(), "1.00"))
        .unwrap();

    assert_eq!(bus.calls(), 8);
}

#[test]
fn invalid_amounts_are_rejected_before_persistence() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = ScriptedBus::default();
    let service = DepositService::with_config(&repo, &bus, immediate_config());

    for amount in ["0", "-10.00", "0.00001"] {
        let err = service
            .submit_deposit(&request(Uuid::new_v4(), amount))
            .unwrap_err();
        assert!(
            matches!(err, SubmitError::Validation(_)),
            "amount {amount} should be rejected, got {err:?}"
        );
    }

    let err = service
        .submit_deposit(&SubmitDepositRequest::new(Uuid::nil(), Decimal::ONE))
        .unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Validation(DepositValidationError::NilUserId)
    ));

    assert_eq!(repo.count_deposits(None).unwrap(), 0);
    assert_eq!(bus.calls(), 0);
}

#[test]
fn cancellation_before_commit_stores_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = ScriptedBus::default();
    let service = DepositService::with_config(&repo, &bus, immediate_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .submit_deposit_with_cancel(&request(Uuid::new_v4(), "5.00"), &cancel)
        .unwrap_err();

    assert!(matches!(err, SubmitError::Cancelled));
    assert_eq!(repo.count_deposits(None).unwrap(), 0);
    assert_eq!(bus.calls(), 0);
}

#[test]
fn cancellation_during_retries_keeps_deposit() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let cancel = CancellationToken::new();
    let bus = InProcessEventBus::new();
    let trigger = cancel.clone();
    bus.subscribe(move |_| {
        trigger.cancel();
        Err("subscriber offline".to_string())
    });
    let service = DepositService::with_config(&repo, &bus, immediate_config());

    let id = service
        .submit_deposit_with_cancel(&request(Uuid::new_v4(), "5.00"), &cancel)
        .unwrap();

    assert!(repo.get_deposit(id).unwrap().is_some());
    assert!(bus.delivered().is_empty());
}

#[test]
fn subscribers_can_refetch_the_deposit_by_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let bus = InProcessEventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |event| {
        sink.lock().unwrap().push(event.deposit_id);
        Ok(())
    });
    let service = DepositService::with_config(&repo, &bus, immediate_config());
    let user_id = Uuid::new_v4();

    let id = service.submit_deposit(&request(user_id, "100.00")).unwrap();

    let notified = seen.lock().unwrap().clone();
    assert_eq!(notified, vec![id]);
    let fetched = service.require_deposit(notified[0]).unwrap();
    assert_eq!(fetched.user_id, user_id);
    assert_eq!(fetched.amount.to_string(), "100.00");
}

#[test]
fn require_deposit_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let service = DepositService::new(&repo, InProcessEventBus::new());
    let missing = Uuid::new_v4();

    let err = service.require_deposit(missing).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));
}

#[test]
fn concurrent_submissions_for_same_user_are_both_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deposits.db");
    drop(open_db(&path).unwrap());

    let bus = Arc::new(ScriptedBus::default());
    let user_id = Uuid::new_v4();

    let ids: Vec<DepositId> = std::thread::scope(|scope| {
        let handles: Vec<_> = ["10.00", "25.50"]
            .into_iter()
            .map(|amount| {
                let bus = Arc::clone(&bus);
                let path = path.clone();
                scope.spawn(move || {
                    let conn = open_db(&path).unwrap();
                    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
                    let service = DepositService::with_config(repo, bus, immediate_config());
                    service.submit_deposit(&request(user_id, amount)).unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_ne!(ids[0], ids[1]);

    let conn = open_db(&path).unwrap();
    let repo = SqliteDepositRepository::try_new(&conn).unwrap();
    let query = DepositListQuery {
        user_id: Some(user_id),
        ..DepositListQuery::default()
    };
    let stored = repo.list_deposits(&query).unwrap();
    assert_eq!(stored.len(), 2);

    let total: Decimal = stored.iter().map(|deposit| deposit.amount).sum();
    assert_eq!(total, parse_amount("35.50").unwrap());
    for id in ids {
        assert!(stored.iter().any(|deposit| deposit.id == id));
    }
    assert_eq!(bus.calls(), 2);
}
