//! Random account readers for running without a chain node.
//!
//! Enabled by `feature.test_only_fake_readers`. Values are random but always
//! structurally valid, so every downstream mapping succeeds.

use crate::error::SourceResult;
use crate::source::{AccountReader, BoxFuture};
use feedmon_core::{
    BillingConfig, ConfigDigest, ConfigState, OffchainConfig, OracleInfo, PublicKey,
    TransmissionState, MAX_ORACLES,
};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

fn random_key<R: Rng>(rng: &mut R) -> PublicKey {
    PublicKey::new(rng.gen())
}

/// Fake transmissions account reader.
#[derive(Debug, Default)]
pub struct RandomTransmissionReader {
    block_height: AtomicU64,
}

impl RandomTransmissionReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate(&self) -> TransmissionState {
        let block_height = self.block_height.fetch_add(1, Ordering::Relaxed) + 1;
        let mut rng = rand::thread_rng();
        TransmissionState {
            config_digest: ConfigDigest(rng.gen()),
            epoch: rng.gen_range(1..1_000),
            round_id: rng.gen_range(1..100_000),
            answer: rng.gen_range(1_000_000i128..10_000_000_000i128),
            timestamp: chrono::Utc::now().timestamp() as u32,
            block_height,
        }
    }
}

impl AccountReader for RandomTransmissionReader {
    type Output = TransmissionState;

    fn read(&self, _account: PublicKey) -> BoxFuture<'_, SourceResult<TransmissionState>> {
        let state = self.generate();
        Box::pin(async move { Ok(state) })
    }
}

/// Fake state account reader.
#[derive(Debug, Default)]
pub struct RandomStateReader {
    block_height: AtomicU64,
}

impl RandomStateReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate(&self) -> ConfigState {
        let block_height = self.block_height.fetch_add(1, Ordering::Relaxed) + 1;
        let mut rng = rand::thread_rng();

        let n = rng.gen_range(4..=MAX_ORACLES);
        let f = ((n - 1) / 3) as u8;
        let oracles = (0..n)
            .map(|_| OracleInfo {
                signer: rng.gen(),
                transmitter: random_key(&mut rng),
                payee: random_key(&mut rng),
            })
            .collect();

        let payload_len = rng.gen_range(16..128);
        let data: Vec<u8> = (0..payload_len).map(|_| rng.gen()).collect();

        ConfigState {
            version: 1,
            owner: random_key(&mut rng),
            config_digest: ConfigDigest(rng.gen()),
            config_count: rng.gen_range(1..100),
            latest_config_block_number: block_height.saturating_sub(1),
            f,
            oracles,
            onchain_config: vec![1],
            offchain_config: OffchainConfig {
                version: 2,
                declared_len: data.len() as u32,
                data,
            },
            billing: BillingConfig {
                observation_payment_gjuels: rng.gen_range(1..1_000),
                transmission_payment_gjuels: rng.gen_range(1..1_000),
            },
            requester_access_controller: random_key(&mut rng),
            billing_access_controller: random_key(&mut rng),
            transmissions: random_key(&mut rng),
            block_height,
        }
    }
}

impl AccountReader for RandomStateReader {
    type Output = ConfigState;

    fn read(&self, _account: PublicKey) -> BoxFuture<'_, SourceResult<ConfigState>> {
        let state = self.generate();
        Box::pin(async move { Ok(state) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_random_state_is_structurally_valid() {
        let reader = RandomStateReader::new();
        for _ in 0..50 {
            let state = reader.read(PublicKey::default()).await.unwrap();
            let n = state.oracles.len();
            assert!((1..=MAX_ORACLES).contains(&n));
            assert!(state.f >= 1);
            assert!(3 * (state.f as usize) < n);
            assert!(state.offchain_config.payload().is_some());
        }
    }

    #[tokio::test]
    async fn test_block_height_advances() {
        let reader = RandomTransmissionReader::new();
        let a = reader.read(PublicKey::default()).await.unwrap();
        let b = reader.read(PublicKey::default()).await.unwrap();
        assert!(b.block_height > a.block_height);
        assert!(a.answer > 0);
    }
}
