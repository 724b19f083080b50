//! Domain events published after a deposit becomes durable.
//!
//! # Invariants
//! - `DepositMade` only ever references a deposit that was already committed.
//! - The event carries the id alone; subscribers re-fetch details by id.

use crate::model::deposit::{Deposit, DepositId};
use serde::{Deserialize, Serialize};

/// Notification that a deposit was durably recorded.
///
/// Delivery may repeat the same event, so subscribers must treat it as
/// idempotent on `deposit_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositMade {
    pub deposit_id: DepositId,
}

impl DepositMade {
    /// Builds the event for a persisted deposit.
    pub fn for_deposit(deposit: &Deposit) -> Self {
        Self {
            deposit_id: deposit.id,
        }
    }
}
