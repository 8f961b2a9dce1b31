//! Reference data directory feed format.
//!
//! The directory publishes a JSON array with one object per feed. Account
//! addresses are base58 strings. A snapshot is all-or-nothing: one malformed
//! entry fails the whole parse so the manager never acts on a partial list.

use crate::error::{RegistryError, RegistryResult};
use feedmon_core::{FeedConfig, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Status of feeds that are no longer monitored.
pub const DEAD_STATUS: &str = "dead";

/// One feed as published by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFeedEntry {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub heartbeat: i64,
    #[serde(default)]
    pub contract_type: String,
    #[serde(default)]
    pub status: String,
    /// Published as a decimal string or a number.
    #[serde(default)]
    pub multiply: Multiply,
    pub contract_address: String,
    pub transmissions_account: String,
    pub state_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Multiply {
    Number(u64),
    Text(String),
}

impl Default for Multiply {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl Multiply {
    fn value(&self) -> RegistryResult<u64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) if s.is_empty() => Ok(0),
            Self::Text(s) => s
                .parse()
                .map_err(|e| RegistryError::Parse(format!("invalid multiply {s:?}: {e}"))),
        }
    }
}

impl RawFeedEntry {
    pub fn is_dead(&self) -> bool {
        self.status.eq_ignore_ascii_case(DEAD_STATUS)
    }

    /// Convert to a feed config, validating every account address.
    pub fn into_feed(self) -> RegistryResult<FeedConfig> {
        let key = |field: &str, value: &str| -> RegistryResult<PublicKey> {
            value
                .parse()
                .map_err(|e| RegistryError::Parse(format!("feed {:?} {field}: {e}", self.name)))
        };
        let contract_address = key("contract_address", &self.contract_address)?;
        let transmissions_account = key("transmissions_account", &self.transmissions_account)?;
        let state_account = key("state_account", &self.state_account)?;
        let multiply = self.multiply.value()?;

        Ok(FeedConfig {
            feed_name: self.name,
            feed_path: self.path,
            symbol: self.symbol,
            heartbeat_sec: self.heartbeat,
            contract_type: self.contract_type,
            contract_status: self.status,
            multiply,
            contract_address,
            transmissions_account,
            state_account,
        })
    }
}

/// Parse a directory snapshot, skipping dead feeds.
pub fn parse_feeds(body: &[u8]) -> RegistryResult<Vec<FeedConfig>> {
    let entries: Vec<RawFeedEntry> = serde_json::from_slice(body)?;
    let total = entries.len();

    let feeds = entries
        .into_iter()
        .filter(|entry| !entry.is_dead())
        .map(RawFeedEntry::into_feed)
        .collect::<RegistryResult<Vec<_>>>()?;

    debug!(total, monitored = feeds.len(), "Parsed feed snapshot");
    Ok(feeds)
}
