//! Scheduler error types.

use thiserror::Error;

use keepwarm_state::TargetId;

/// Errors surfaced by control surface operations.
///
/// Probe failures are never errors; they feed the consecutive-failure
/// counter instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("target not found: {0}")]
    NotFound(TargetId),

    #[error("invalid target config: {0}")]
    InvalidConfig(String),

    #[error("state store error: {0}")]
    State(#[from] keepwarm_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
