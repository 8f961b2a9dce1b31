//! Export error types.

use thiserror::Error;

/// Failure of one export pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Publish error: {0}")]
    Publish(String),
}

pub type ExportResult<T> = Result<T, ExportError>;
