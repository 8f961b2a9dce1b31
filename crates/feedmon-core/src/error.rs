//! Error types for feedmon-core.

use thiserror::Error;

use crate::digest::ConfigDigest;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Config digest mismatch: {onchain} (onchain) != {calculated} (calculated)")]
    DigestMismatch {
        onchain: ConfigDigest,
        calculated: ConfigDigest,
    },

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
