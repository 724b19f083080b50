//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable store contract used by the submission flow.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Deposit::validate()` before persistence.
//! - A write either commits fully or leaves no visible row.

pub mod deposit_repo;
