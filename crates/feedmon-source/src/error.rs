//! Source error types.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single read.
///
/// `Clone` so one upstream failure can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Read error: {0}")]
    Read(String),
}

impl SourceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Read(_) => "read",
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
