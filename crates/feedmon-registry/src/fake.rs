//! Random feed directory for running without the reference data directory.

use feedmon_core::{FeedConfig, PublicKey};
use feedmon_source::{BoxFuture, Source, SourceResult};
use parking_lot::Mutex;
use rand::Rng;

const SYMBOLS: &[&str] = &["SOL", "BTC", "ETH", "LINK", "USDC", "BNB", "AVAX", "DOT"];

/// Serves a random set of feeds.
///
/// The set is stable across fetches unless churn is enabled, in which case
/// every fetch replaces one feed with a new one.
pub struct FakeRddSource {
    feeds: Mutex<Vec<FeedConfig>>,
    churn: bool,
}

impl FakeRddSource {
    pub fn new(count: usize) -> Self {
        let mut rng = rand::thread_rng();
        let feeds = (0..count).map(|i| random_feed(&mut rng, i)).collect();
        Self {
            feeds: Mutex::new(feeds),
            churn: false,
        }
    }

    pub fn with_churn(mut self, churn: bool) -> Self {
        self.churn = churn;
        self
    }

    fn snapshot(&self) -> Vec<FeedConfig> {
        let mut feeds = self.feeds.lock();
        if self.churn && !feeds.is_empty() {
            let mut rng = rand::thread_rng();
            let idx = rng.gen_range(0..feeds.len());
            feeds[idx] = random_feed(&mut rng, idx);
        }
        feeds.clone()
    }
}

fn random_feed<R: Rng>(rng: &mut R, idx: usize) -> FeedConfig {
    let symbol = SYMBOLS[idx % SYMBOLS.len()];
    FeedConfig {
        feed_name: format!("{symbol} / USD"),
        feed_path: format!("{}-usd-{idx}", symbol.to_lowercase()),
        symbol: "$".to_string(),
        heartbeat_sec: rng.gen_range(1..3600),
        contract_type: "ocr2".to_string(),
        contract_status: "live".to_string(),
        multiply: 100_000_000,
        contract_address: PublicKey::new(rng.gen()),
        transmissions_account: PublicKey::new(rng.gen()),
        state_account: PublicKey::new(rng.gen()),
    }
}

impl Source for FakeRddSource {
    type Output = Vec<FeedConfig>;

    fn fetch(&self) -> BoxFuture<'_, SourceResult<Vec<FeedConfig>>> {
        let feeds = self.snapshot();
        Box::pin(async move { Ok(feeds) })
    }
}
