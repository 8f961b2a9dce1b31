//! Feed identity and chain configuration types.
//!
//! A feed is identified on chain by three accounts: the OCR2 program
//! (`contract_address`), the state account holding the oracle configuration,
//! and the transmissions account holding the latest answers.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 32-byte account address, displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes. Used verbatim as the message key for exported records.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Build a key from an arbitrary byte slice.
    ///
    /// Fails unless the slice is exactly 32 bytes long.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl FromStr for PublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CoreError::InvalidPublicKey(format!("{s}: {e}")))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity used when diffing reference-directory snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedKey {
    pub contract_address: PublicKey,
    pub state_account: PublicKey,
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.contract_address, self.state_account)
    }
}

/// Feed identity, sourced from the reference directory.
///
/// Never mutated once constructed; monitors receive their own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub feed_name: String,
    #[serde(default)]
    pub feed_path: String,
    pub symbol: String,
    #[serde(default)]
    pub heartbeat_sec: i64,
    #[serde(default)]
    pub contract_type: String,
    #[serde(default)]
    pub contract_status: String,
    /// Answer multiplier (decimal scaling) advertised for the feed.
    #[serde(default)]
    pub multiply: u64,

    /// OCR2 program id.
    pub contract_address: PublicKey,
    pub transmissions_account: PublicKey,
    pub state_account: PublicKey,
}

impl FeedConfig {
    pub fn key(&self) -> FeedKey {
        FeedKey {
            contract_address: self.contract_address,
            state_account: self.state_account,
        }
    }
}

/// Chain-level configuration shared by every feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain node.
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: String,
    pub network_name: String,
    pub network_id: String,
    pub chain_id: String,
    /// Upper bound for a single account read (ms).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Interval between account reads for each feed (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Outcomes queued per poller before the poller blocks. 0 = synchronous handoff.
    #[serde(default)]
    pub buffer_depth: usize,
}

fn default_rpc_endpoint() -> String {
    "http://127.0.0.1:8899".to_string()
}

fn default_read_timeout_ms() -> u64 {
    2_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl ChainConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: default_rpc_endpoint(),
            network_name: "solana-devnet".to_string(),
            network_id: "devnet".to_string(),
            chain_id: "devnet".to_string(),
            read_timeout_ms: default_read_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            buffer_depth: 0,
        }
    }
}
