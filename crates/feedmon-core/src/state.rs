//! Decoded on-chain account state.
//!
//! These are the values produced by the chain readers. Binary account layout
//! decoding happens in the reader implementations; everything here is plain
//! data.

use crate::digest::ConfigDigest;
use crate::types::PublicKey;
use serde::{Deserialize, Serialize};

/// Maximum number of oracles an OCR2 state account can hold.
pub const MAX_ORACLES: usize = 19;

/// One oracle in the configured set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleInfo {
    /// Secp256k1 signer address (eth-style, 20 bytes).
    pub signer: [u8; 20],
    pub transmitter: PublicKey,
    pub payee: PublicKey,
}

/// Offchain config blob as stored in the state account.
///
/// The account stores a fixed-size buffer and a declared length; `data` holds
/// the buffer contents read from chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffchainConfig {
    pub version: u64,
    pub data: Vec<u8>,
    pub declared_len: u32,
}

impl OffchainConfig {
    /// Bytes covered by the declared length, or `None` if the declared length
    /// overruns the buffer.
    pub fn payload(&self) -> Option<&[u8]> {
        self.data.get(..self.declared_len as usize)
    }
}

/// Billing parameters, in gjuels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    pub observation_payment_gjuels: u32,
    pub transmission_payment_gjuels: u32,
}

/// Configuration and oracle set read from a feed's state account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigState {
    pub version: u8,
    pub owner: PublicKey,
    pub config_digest: ConfigDigest,
    pub config_count: u32,
    pub latest_config_block_number: u64,
    /// Maximum number of faulty oracles tolerated.
    pub f: u8,
    pub oracles: Vec<OracleInfo>,
    pub onchain_config: Vec<u8>,
    pub offchain_config: OffchainConfig,
    pub billing: BillingConfig,
    pub requester_access_controller: PublicKey,
    pub billing_access_controller: PublicKey,
    pub transmissions: PublicKey,
    /// Chain height at which the account was read.
    pub block_height: u64,
}

/// Latest round read from a feed's transmissions account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionState {
    pub config_digest: ConfigDigest,
    pub epoch: u32,
    pub round_id: u32,
    pub answer: i128,
    /// Unix seconds reported with the answer.
    pub timestamp: u32,
    /// Chain height at which the account was read.
    pub block_height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offchain_payload_within_bounds() {
        let cfg = OffchainConfig {
            version: 2,
            data: vec![1, 2, 3, 4, 0, 0],
            declared_len: 4,
        };
        assert_eq!(cfg.payload(), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_offchain_payload_overrun() {
        let cfg = OffchainConfig {
            version: 2,
            data: vec![1, 2],
            declared_len: 8,
        };
        assert!(cfg.payload().is_none());
    }
}
