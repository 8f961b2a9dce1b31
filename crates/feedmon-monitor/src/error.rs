//! Monitor error types.

use feedmon_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<tokio::task::JoinError> for MonitorError {
    fn from(e: tokio::task::JoinError) -> Self {
        let reason = if e.is_panic() { "panicked" } else { "cancelled" };
        MonitorError::Join(format!("{reason}: {e}"))
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
