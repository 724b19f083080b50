//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store and notification calls into the deposit use case.
//! - Keep callers decoupled from storage and channel details.

pub mod cancel;
pub mod deposit_service;
pub mod retry;
