//! OCR2 config digest computation.
//!
//! The state account advertises the digest of its current configuration.
//! Recomputing it locally and comparing the two detects protocol version skew
//! between the monitor and the program, or corrupted account data.
//!
//! Preimage layout (all integers big-endian):
//!
//! | Field | Encoding |
//! |-------|----------|
//! | program id | 32 bytes |
//! | state account | 32 bytes |
//! | config count | u64 |
//! | oracle count | u8 |
//! | signers | 20 bytes each |
//! | transmitters | 32 bytes each |
//! | f | u8 |
//! | onchain config | u32 length + bytes |
//! | offchain config version | u64 |
//! | offchain config | u32 length + bytes |
//!
//! The first two bytes of the SHA-256 output are replaced by the
//! `CONFIG_DIGEST_PREFIX`.

use crate::error::{CoreError, Result};
use crate::state::{ConfigState, MAX_ORACLES};
use crate::types::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest prefix identifying the Solana OCR2 config digest scheme.
pub const CONFIG_DIGEST_PREFIX: [u8; 2] = [0x00, 0x03];

/// Fixed-size configuration fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConfigDigest(pub [u8; 32]);

impl ConfigDigest {
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigDigest({})", self.hex())
    }
}

impl Serialize for ConfigDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for ConfigDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("config digest must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Computes config digests for one OCR2 program.
#[derive(Debug, Clone, Copy)]
pub struct OffchainConfigDigester {
    pub program_id: PublicKey,
}

impl OffchainConfigDigester {
    pub fn new(program_id: PublicKey) -> Self {
        Self { program_id }
    }

    /// Deterministic digest of `state`'s configuration.
    ///
    /// Only configuration fields contribute; the advertised digest, billing
    /// and block height do not. Fails when the oracle set exceeds
    /// `MAX_ORACLES`, since the count is hashed as a single byte.
    pub fn config_digest(
        &self,
        state_account: &PublicKey,
        state: &ConfigState,
    ) -> Result<ConfigDigest> {
        let oracle_count = u8::try_from(state.oracles.len())
            .ok()
            .filter(|n| usize::from(*n) <= MAX_ORACLES)
            .ok_or_else(|| {
                CoreError::InvalidConfig(format!(
                    "{} oracles exceeds the maximum of {MAX_ORACLES}",
                    state.oracles.len()
                ))
            })?;

        let mut hasher = Sha256::new();
        hasher.update(self.program_id.as_bytes());
        hasher.update(state_account.as_bytes());
        hasher.update(u64::from(state.config_count).to_be_bytes());
        hasher.update([oracle_count]);
        for oracle in &state.oracles {
            hasher.update(oracle.signer);
        }
        for oracle in &state.oracles {
            hasher.update(oracle.transmitter.as_bytes());
        }
        hasher.update([state.f]);
        update_length_prefixed(&mut hasher, &state.onchain_config);
        hasher.update(state.offchain_config.version.to_be_bytes());
        // An overrunning declared length hashes the whole buffer; the mismatch
        // against the advertised digest then surfaces the corruption.
        let offchain = state
            .offchain_config
            .payload()
            .unwrap_or(state.offchain_config.data.as_slice());
        update_length_prefixed(&mut hasher, offchain);

        let mut out: [u8; 32] = hasher.finalize().into();
        out[..2].copy_from_slice(&CONFIG_DIGEST_PREFIX);
        Ok(ConfigDigest(out))
    }
}

fn update_length_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u32).to_be_bytes());
    hasher.update(bytes);
}

/// Recompute the config digest and compare it with the advertised one.
///
/// Returns the calculated digest on success. A mismatch is returned as
/// `CoreError::DigestMismatch` and must be handled by the caller; an
/// oversized oracle set as `CoreError::InvalidConfig`.
pub fn verify_config_digest(
    program_id: PublicKey,
    state_account: &PublicKey,
    state: &ConfigState,
) -> Result<ConfigDigest> {
    let calculated = OffchainConfigDigester::new(program_id).config_digest(state_account, state)?;
    if calculated != state.config_digest {
        return Err(CoreError::DigestMismatch {
            onchain: state.config_digest,
            calculated,
        });
    }
    Ok(calculated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BillingConfig, OffchainConfig, OracleInfo};

    fn program() -> PublicKey {
        PublicKey::new([10; 32])
    }

    fn state_account() -> PublicKey {
        PublicKey::new([11; 32])
    }

    fn sample_state() -> ConfigState {
        let oracles = (0..4u8)
            .map(|i| OracleInfo {
                signer: [i + 1; 20],
                transmitter: PublicKey::new([i + 50; 32]),
                payee: PublicKey::new([i + 100; 32]),
            })
            .collect();
        ConfigState {
            version: 1,
            owner: PublicKey::new([1; 32]),
            config_digest: ConfigDigest::default(),
            config_count: 3,
            latest_config_block_number: 1_000,
            f: 1,
            oracles,
            onchain_config: vec![1, 0, 0, 0],
            offchain_config: OffchainConfig {
                version: 2,
                data: vec![9, 8, 7, 6, 0, 0],
                declared_len: 4,
            },
            billing: BillingConfig::default(),
            requester_access_controller: PublicKey::new([2; 32]),
            billing_access_controller: PublicKey::new([3; 32]),
            transmissions: PublicKey::new([4; 32]),
            block_height: 42,
        }
    }

    fn digest_of(state: &ConfigState) -> ConfigDigest {
        OffchainConfigDigester::new(program())
            .config_digest(&state_account(), state)
            .unwrap()
    }

    #[test]
    fn test_digest_is_deterministic() {
        let state = sample_state();
        assert_eq!(digest_of(&state), digest_of(&state.clone()));
    }

    #[test]
    fn test_digest_has_prefix() {
        let digest = digest_of(&sample_state());
        assert_eq!(&digest.0[..2], &CONFIG_DIGEST_PREFIX);
    }

    #[test]
    fn test_digest_changes_with_every_config_field() {
        let base = digest_of(&sample_state());

        let mutations: Vec<Box<dyn Fn(&mut ConfigState)>> = vec![
            Box::new(|s: &mut ConfigState| s.config_count += 1),
            Box::new(|s: &mut ConfigState| s.f = 2),
            Box::new(|s: &mut ConfigState| s.oracles[0].signer[0] ^= 0xff),
            Box::new(|s: &mut ConfigState| s.oracles[3].transmitter = PublicKey::new([0xee; 32])),
            Box::new(|s: &mut ConfigState| {
                s.oracles.pop();
            }),
            Box::new(|s: &mut ConfigState| s.onchain_config.push(1)),
            Box::new(|s: &mut ConfigState| s.offchain_config.version = 3),
            Box::new(|s: &mut ConfigState| s.offchain_config.data[0] = 0),
            Box::new(|s: &mut ConfigState| s.offchain_config.declared_len = 3),
        ];

        for (i, mutate) in mutations.iter().enumerate() {
            let mut state = sample_state();
            mutate(&mut state);
            assert_ne!(digest_of(&state), base, "mutation {i} did not change digest");
        }
    }

    #[test]
    fn test_digest_ignores_non_config_fields() {
        let base = digest_of(&sample_state());
        let mut state = sample_state();
        state.block_height = 99;
        state.billing.observation_payment_gjuels = 5;
        state.oracles[0].payee = PublicKey::new([0; 32]);
        assert_eq!(digest_of(&state), base);
    }

    #[test]
    fn test_digest_depends_on_accounts() {
        let state = sample_state();
        let other_program = OffchainConfigDigester::new(PublicKey::new([12; 32]))
            .config_digest(&state_account(), &state)
            .unwrap();
        let other_state_account = OffchainConfigDigester::new(program())
            .config_digest(&PublicKey::new([13; 32]), &state)
            .unwrap();
        let base = digest_of(&state);
        assert_ne!(other_program, base);
        assert_ne!(other_state_account, base);
    }

    #[test]
    fn test_verify_matching_digest() {
        let mut state = sample_state();
        state.config_digest = digest_of(&state);
        let digest = verify_config_digest(program(), &state_account(), &state).unwrap();
        assert_eq!(digest, state.config_digest);
    }

    #[test]
    fn test_verify_surfaces_mismatch() {
        let mut state = sample_state();
        state.config_digest = ConfigDigest([0xab; 32]);
        let err = verify_config_digest(program(), &state_account(), &state).unwrap_err();
        match err {
            CoreError::DigestMismatch {
                onchain,
                calculated,
            } => {
                assert_eq!(onchain, ConfigDigest([0xab; 32]));
                assert_eq!(calculated, digest_of(&state));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_digest_rejects_oversized_oracle_set() {
        let mut state = sample_state();
        let extra = state.oracles[0].clone();
        state.oracles.resize(MAX_ORACLES + 1, extra);

        let err = OffchainConfigDigester::new(program())
            .config_digest(&state_account(), &state)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
        assert!(matches!(
            verify_config_digest(program(), &state_account(), &state),
            Err(CoreError::InvalidConfig(_))
        ));

        state.oracles.truncate(MAX_ORACLES);
        assert!(OffchainConfigDigester::new(program())
            .config_digest(&state_account(), &state)
            .is_ok());
    }

    #[test]
    fn test_digest_serde_hex() {
        let digest = digest_of(&sample_state());
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.hex()));
        let back: ConfigDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
