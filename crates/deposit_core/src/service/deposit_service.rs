//! Deposit submission use-case service.
//!
//! # Responsibility
//! - Sequence validation, persistence and notification for one deposit.
//! - Own the bounded retry loop around `EventBus::publish`.
//!
//! # Invariants
//! - A deposit id is returned only after the store committed the deposit.
//! - A failed commit is returned immediately; publish is never attempted.
//! - Publish failures, including an exhausted retry budget, are logged and
//!   never surfaced to the caller nor undo the stored deposit.
//! - Retry state lives in the call frame; submissions share nothing.

use crate::bus::{EventBus, PublishError};
use crate::model::deposit::{
    validate_amount, validate_user_id, Deposit, DepositId, DepositValidationError, UserId,
};
use crate::model::event::DepositMade;
use crate::repo::deposit_repo::{DepositListQuery, DepositRepository, RepoError, RepoResult};
use crate::service::cancel::CancellationToken;
use crate::service::retry::PublishRetryPolicy;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type SubmitResult<T> = Result<T, SubmitError>;

/// Caller-visible submission failure.
///
/// There is deliberately no publish variant: notification problems end in
/// the log, not here.
#[derive(Debug)]
pub enum SubmitError {
    /// Request was rejected before anything was written.
    Validation(DepositValidationError),
    /// The store did not commit the deposit.
    Persistence(RepoError),
    /// Caller cancelled before the commit; nothing was written.
    Cancelled,
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid deposit request: {err}"),
            Self::Persistence(err) => write!(f, "deposit was not persisted: {err}"),
            Self::Cancelled => write!(f, "deposit submission cancelled before commit"),
        }
    }
}

impl Error for SubmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

impl From<DepositValidationError> for SubmitError {
    fn from(value: DepositValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Stages of one submission, in order. `PersistFailed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Received,
    Persisting,
    Persisted,
    PersistFailed,
    Notifying,
    Completed,
}

impl SubmissionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Persisting => "persisting",
            Self::Persisted => "persisted",
            Self::PersistFailed => "persist_failed",
            Self::Notifying => "notifying",
            Self::Completed => "completed",
        }
    }
}

/// Request model for one deposit submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitDepositRequest {
    /// Account credited by the deposit.
    pub user_id: UserId,
    /// Exact decimal amount.
    pub amount: Decimal,
}

impl SubmitDepositRequest {
    pub fn new(user_id: UserId, amount: Decimal) -> Self {
        Self { user_id, amount }
    }

    fn validate(&self) -> Result<(), DepositValidationError> {
        validate_user_id(self.user_id)?;
        validate_amount(self.amount)
    }
}

/// Result of the notification step. Only observed by logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32, last_error: PublishError },
    Cancelled { attempts: u32 },
}

impl PublishOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Service tuning knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepositServiceConfig {
    pub retry: PublishRetryPolicy,
}

/// Use-case service for deposit submission.
pub struct DepositService<R: DepositRepository, B: EventBus> {
    repo: R,
    bus: B,
    config: DepositServiceConfig,
}

impl<R: DepositRepository, B: EventBus> DepositService<R, B> {
    /// Creates a service with the default retry policy.
    pub fn new(repo: R, bus: B) -> Self {
        Self::with_config(repo, bus, DepositServiceConfig::default())
    }

    pub fn with_config(repo: R, bus: B, config: DepositServiceConfig) -> Self {
        Self { repo, bus, config }
    }

    pub fn config(&self) -> &DepositServiceConfig {
        &self.config
    }

    /// Records a deposit and notifies subscribers.
    ///
    /// # Contract
    /// - Returns the new deposit id once the store committed it, whatever
    ///   happens during notification.
    /// - Returns `SubmitError::Persistence` without publishing when the
    ///   commit fails.
    pub fn submit_deposit(&self, request: &SubmitDepositRequest) -> SubmitResult<DepositId> {
        self.submit_deposit_with_cancel(request, &CancellationToken::new())
    }

    /// Same as `submit_deposit`, honoring `cancel`.
    ///
    /// Cancellation before the commit aborts with `SubmitError::Cancelled`
    /// and stores nothing. Cancellation afterwards only stops further
    /// publish attempts; the id is still returned.
    pub fn submit_deposit_with_cancel(
        &self,
        request: &SubmitDepositRequest,
        cancel: &CancellationToken,
    ) -> SubmitResult<DepositId> {
        let started_at = Instant::now();

        request.validate().map_err(|err| {
            warn!(
                "event=deposit_submit module=service stage={} status=rejected error={}",
                SubmissionStage::Received.as_str(),
                err
            );
            SubmitError::from(err)
        })?;

        let deposit = Deposit::new(request.user_id, request.amount);
        debug!(
            "event=deposit_submit module=service stage={} deposit_id={} user_id={}",
            SubmissionStage::Received.as_str(),
            deposit.id,
            deposit.user_id
        );

        if cancel.is_cancelled() {
            info!(
                "event=deposit_submit module=service stage={} status=cancelled deposit_id={}",
                SubmissionStage::Persisting.as_str(),
                deposit.id
            );
            return Err(SubmitError::Cancelled);
        }

        let deposit_id = self.persist(&deposit)?;

        let event = DepositMade::for_deposit(&deposit);
        let outcome = publish_with_retry(&self.bus, &event, &self.config.retry, cancel);

        info!(
            "event=deposit_submit module=service stage={} status=ok deposit_id={} publish_attempts={} delivered={} duration_ms={}",
            SubmissionStage::Completed.as_str(),
            deposit_id,
            outcome.attempts(),
            outcome.is_delivered(),
            started_at.elapsed().as_millis()
        );
        Ok(deposit_id)
    }

    /// Gets one deposit by id.
    pub fn get_deposit(&self, id: DepositId) -> RepoResult<Option<Deposit>> {
        self.repo.get_deposit(id)
    }

    /// Gets one deposit by id, treating absence as `RepoError::NotFound`.
    pub fn require_deposit(&self, id: DepositId) -> RepoResult<Deposit> {
        self.repo.get_deposit(id)?.ok_or(RepoError::NotFound(id))
    }

    /// Lists deposits using filter and pagination options.
    pub fn list_deposits(&self, query: &DepositListQuery) -> RepoResult<Vec<Deposit>> {
        self.repo.list_deposits(query)
    }

    fn persist(&self, deposit: &Deposit) -> SubmitResult<DepositId> {
        match self.repo.create_deposit(deposit) {
            Ok(id) => {
                info!(
                    "event=deposit_submit module=service stage={} status=ok deposit_id={}",
                    SubmissionStage::Persisted.as_str(),
                    id
                );
                Ok(id)
            }
            Err(err) => {
                error!(
                    "event=deposit_submit module=service stage={} status=error deposit_id={} error={}",
                    SubmissionStage::PersistFailed.as_str(),
                    deposit.id,
                    err
                );
                Err(SubmitError::Persistence(err))
            }
        }
    }
}

/// Publishes `event`, retrying failures sequentially per `policy`.
///
/// Stops at the first success, when the attempt budget is spent, or at an
/// attempt boundary once `cancel` is set. Exhaustion is logged at error
/// level with the deposit id so undelivered events stay observable.
pub fn publish_with_retry<B: EventBus + ?Sized>(
    bus: &B,
    event: &DepositMade,
    policy: &PublishRetryPolicy,
    cancel: &CancellationToken,
) -> PublishOutcome {
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            warn!(
                "event=deposit_publish module=service stage={} status=cancelled deposit_id={} attempts={}",
                SubmissionStage::Notifying.as_str(),
                event.deposit_id,
                attempt
            );
            return PublishOutcome::Cancelled { attempts: attempt };
        }

        attempt += 1;
        match bus.publish(event) {
            Ok(()) => {
                debug!(
                    "event=deposit_publish module=service stage={} status=ok deposit_id={} attempt={}",
                    SubmissionStage::Notifying.as_str(),
                    event.deposit_id,
                    attempt
                );
                return PublishOutcome::Delivered { attempts: attempt };
            }
            Err(err) if attempt >= max_attempts => {
                error!(
                    "event=deposit_publish module=service stage={} status=exhausted deposit_id={} attempts={} error={}",
                    SubmissionStage::Notifying.as_str(),
                    event.deposit_id,
                    attempt,
                    err
                );
                return PublishOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                };
            }
            Err(err) => {
                warn!(
                    "event=deposit_publish module=service stage={} status=retry deposit_id={} attempt={} max_attempts={} error={}",
                    SubmissionStage::Notifying.as_str(),
                    event.deposit_id,
                    attempt,
                    max_attempts,
                    err
                );
                let delay = policy.delay_before_retry(attempt - 1);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }
    }
}
