//! Core deposit recording logic.
//! This crate is the single source of truth for deposit invariants:
//! persist first, then notify with bounded retry.

pub mod bus;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use bus::{EventBus, InProcessEventBus, LogEventBus, PublishError, PublishResult};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::deposit::{parse_amount, Deposit, DepositId, DepositValidationError, UserId};
pub use model::event::DepositMade;
pub use repo::deposit_repo::{
    DepositListQuery, DepositRepository, RepoError, RepoResult, SqliteDepositRepository,
};
pub use service::cancel::CancellationToken;
pub use service::deposit_service::{
    publish_with_retry, DepositService, DepositServiceConfig, PublishOutcome, SubmissionStage,
    SubmitDepositRequest, SubmitError, SubmitResult,
};
pub use service::retry::PublishRetryPolicy;

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
