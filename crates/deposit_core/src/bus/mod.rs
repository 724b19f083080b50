//! Notification channel contract and in-process implementations.
//!
//! # Responsibility
//! - Define the `publish(event) -> ok | error` seam consumed by the
//!   submission flow.
//! - Ship an in-process pub-sub bus and a log-only bus.
//!
//! # Invariants
//! - Publishing the same event twice must be harmless for subscribers;
//!   this crate never deduplicates.
//! - `PublishError` never crosses the submission boundary to the caller.

use crate::model::event::DepositMade;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod in_process;
mod log_bus;

pub use in_process::{InProcessEventBus, SubscriberHandler};
pub use log_bus::LogEventBus;

pub type PublishResult = Result<(), PublishError>;

/// Failure reported by a notification channel for one publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// No transport or subscriber could accept the event.
    Unavailable,
    /// A subscriber or transport rejected the event.
    Rejected(String),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "notification channel unavailable"),
            Self::Rejected(reason) => write!(f, "notification rejected: {reason}"),
        }
    }
}

impl Error for PublishError {}

/// Publish side of the external notification channel.
pub trait EventBus {
    fn publish(&self, event: &DepositMade) -> PublishResult;
}

impl<B: EventBus + ?Sized> EventBus for &B {
    fn publish(&self, event: &DepositMade) -> PublishResult {
        (**self).publish(event)
    }
}

impl<B: EventBus + ?Sized> EventBus for Arc<B> {
    fn publish(&self, event: &DepositMade) -> PublishResult {
        (**self).publish(event)
    }
}
