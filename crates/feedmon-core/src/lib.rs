//! Core domain types for the on-chain feed monitor.
//!
//! This crate provides the types shared by every other crate:
//! - `PublicKey`, `FeedConfig`, `FeedKey`: feed identity as advertised by the
//!   reference directory
//! - `ChainConfig`: static chain-level settings copied into every record
//! - `ConfigState`, `TransmissionState`: decoded on-chain account state
//! - `Envelope`, `ReadOutcome`: what flows from pollers to exporters
//! - `OffchainConfigDigester`: local recomputation of the config digest

pub mod digest;
pub mod envelope;
pub mod error;
pub mod state;
pub mod types;

pub use digest::{verify_config_digest, ConfigDigest, OffchainConfigDigester};
pub use envelope::{Envelope, ReadOutcome, StateEnvelope, TransmissionEnvelope};
pub use error::{CoreError, Result};
pub use state::{
    BillingConfig, ConfigState, OffchainConfig, OracleInfo, TransmissionState, MAX_ORACLES,
};
pub use types::{ChainConfig, FeedConfig, FeedKey, PublicKey};
