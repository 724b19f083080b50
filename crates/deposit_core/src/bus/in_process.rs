//! Synchronous in-process pub-sub bus.

use super::{EventBus, PublishError, PublishResult};
use crate::model::event::DepositMade;
use log::debug;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Subscriber callback. Returning `Err` fails the publish attempt.
pub type SubscriberHandler = Arc<dyn Fn(&DepositMade) -> Result<(), String> + Send + Sync>;

/// In-process bus delivering each event to every subscriber in
/// registration order.
///
/// A publish succeeds only when all subscribers accept the event. Because a
/// failed attempt is retried as a whole, subscribers that already accepted it
/// see it again; they must be idempotent on `deposit_id`.
#[derive(Default)]
pub struct InProcessEventBus {
    subscribers: RwLock<Vec<SubscriberHandler>>,
    delivered: Mutex<Vec<DepositMade>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one subscriber.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&DepositMade) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Events accepted by all subscribers, in delivery order.
    pub fn delivered(&self) -> Vec<DepositMade> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventBus for InProcessEventBus {
    fn publish(&self, event: &DepositMade) -> PublishResult {
        // Snapshot so handlers may subscribe without deadlocking.
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if subscribers.is_empty() {
            return Err(PublishError::Unavailable);
        }

        for (index, handler) in subscribers.iter().enumerate() {
            if let Err(reason) = handler(event) {
                debug!(
                    "event=bus_publish module=bus status=rejected deposit_id={} subscriber={}",
                    event.deposit_id, index
                );
                return Err(PublishError::Rejected(reason));
            }
        }

        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*event);
        Ok(())
    }
}
