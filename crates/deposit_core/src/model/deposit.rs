//! Deposit domain model.
//!
//! # Responsibility
//! - Define the canonical record for one credit of funds to a user.
//! - Own amount parsing and the validation rules applied before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another deposit.
//! - `amount` is a fixed-point decimal; binary floats never touch it.
//! - A deposit is never mutated after construction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of one deposit. Also the correlation key of `DepositMade`.
pub type DepositId = Uuid;

/// Identifier of the credited account.
pub type UserId = Uuid;

/// Maximum number of fractional digits accepted for an amount.
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Validation errors for deposit invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositValidationError {
    NilDepositId,
    NilUserId,
    NonPositiveAmount(Decimal),
    ExcessiveScale { scale: u32 },
    InvalidAmount(String),
}

impl Display for DepositValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilDepositId => write!(f, "deposit id must not be nil"),
            Self::NilUserId => write!(f, "user id must not be nil"),
            Self::NonPositiveAmount(amount) => {
                write!(f, "deposit amount must be positive, got {amount}")
            }
            Self::ExcessiveScale { scale } => write!(
                f,
                "deposit amount has {scale} fractional digits; at most {MAX_AMOUNT_SCALE} allowed"
            ),
            Self::InvalidAmount(raw) => write!(f, "invalid deposit amount `{raw}`"),
        }
    }
}

impl Error for DepositValidationError {}

/// Durable record of one deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DepositWire")]
pub struct Deposit {
    /// Generated at creation; globally unique.
    pub id: DepositId,
    pub user_id: UserId,
    /// Serialized as a decimal string to keep exact precision on the wire.
    pub amount: Decimal,
    /// Unix epoch milliseconds at construction time.
    pub created_at_ms: i64,
}

#[derive(Deserialize)]
struct DepositWire {
    id: DepositId,
    user_id: UserId,
    amount: Decimal,
    created_at_ms: i64,
}

impl TryFrom<DepositWire> for Deposit {
    type Error = DepositValidationError;

    fn try_from(value: DepositWire) -> Result<Self, Self::Error> {
        Self::with_id(value.id, value.user_id, value.amount, value.created_at_ms)
    }
}

impl Deposit {
    /// Creates a new deposit with a generated id and the current timestamp.
    ///
    /// Does not validate; callers persisting the deposit go through
    /// `validate()` in the repository write path.
    pub fn new(user_id: UserId, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            created_at_ms: now_epoch_ms(),
        }
    }

    /// Rebuilds a deposit whose identity already exists (storage, import).
    ///
    /// # Errors
    /// - Any `DepositValidationError` from `validate()`.
    pub fn with_id(
        id: DepositId,
        user_id: UserId,
        amount: Decimal,
        created_at_ms: i64,
    ) -> Result<Self, DepositValidationError> {
        let deposit = Self {
            id,
            user_id,
            amount,
            created_at_ms,
        };
        deposit.validate()?;
        Ok(deposit)
    }

    /// Checks invariants required before a deposit may become durable.
    pub fn validate(&self) -> Result<(), DepositValidationError> {
        if self.id.is_nil() {
            return Err(DepositValidationError::NilDepositId);
        }
        validate_user_id(self.user_id)?;
        validate_amount(self.amount)
    }
}

/// Rejects the nil user id.
pub fn validate_user_id(user_id: UserId) -> Result<(), DepositValidationError> {
    if user_id.is_nil() {
        return Err(DepositValidationError::NilUserId);
    }
    Ok(())
}

/// Rejects zero, negative and over-scaled amounts.
pub fn validate_amount(amount: Decimal) -> Result<(), DepositValidationError> {
    if amount <= Decimal::ZERO {
        return Err(DepositValidationError::NonPositiveAmount(amount));
    }
    if amount.scale() > MAX_AMOUNT_SCALE {
        return Err(DepositValidationError::ExcessiveScale {
            scale: amount.scale(),
        });
    }
    Ok(())
}

/// Parses caller-supplied amount text without any rounding.
///
/// Leading/trailing whitespace is ignored. Sign and scale are preserved, so
/// `"100.00"` keeps scale 2. Range checks are left to `validate_amount`.
pub fn parse_amount(raw: &str) -> Result<Decimal, DepositValidationError> {
    let trimmed = raw.trim();
    Decimal::from_str_exact(trimmed)
        .map_err(|_| DepositValidationError::InvalidAmount(trimmed.to_string()))
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
