//! Log-only bus for deployments without a subscriber.

use super::{EventBus, PublishResult};
use crate::model::event::DepositMade;
use log::info;

/// Writes each event as a structured log line and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventBus;

impl EventBus for LogEventBus {
    fn publish(&self, event: &DepositMade) -> PublishResult {
        info!(
            "event=deposit_made module=bus status=published deposit_id={}",
            event.deposit_id
        );
        Ok(())
    }
}
