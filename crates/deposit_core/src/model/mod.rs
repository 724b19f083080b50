//! Deposit domain model and events.
//!
//! # Responsibility
//! - Define the deposit record persisted by the store.
//! - Define the `DepositMade` event emitted after persistence.
//!
//! # Invariants
//! - Every deposit is identified by a stable `DepositId`.
//! - Deposits are never deleted or reversed by this crate.

pub mod deposit;
pub mod event;
