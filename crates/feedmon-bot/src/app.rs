//! Application orchestration.
//!
//! Builds the feed source, the shared chain readers and the monitor factory
//! from configuration, then runs:
//! - the feed poller, feeding snapshots to the manager
//! - the manager, which owns one monitor per feed
//! - the metrics and health HTTP server (optional)

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use feedmon_core::{ConfigState, FeedConfig, TransmissionState};
use feedmon_export::{DynProducer, LogProducer, Schemas};
use feedmon_monitor::{DynMonitorFactory, FeedMonitorFactory, Manager, FEEDS_SOURCE};
use feedmon_registry::{FakeRddSource, FileFeedSource, RddClient, StaticFeedSource};
use feedmon_source::{
    CoalescingReader, DynAccountReader, RandomStateReader, RandomTransmissionReader, Source,
    SourcePoller,
};
use feedmon_telemetry::{DynMetrics, PrometheusMetrics};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Feed list source selected from configuration.
pub type DynFeedSource = Arc<dyn Source<Output = Vec<FeedConfig>>>;

/// Transmissions and state account readers.
struct ChainReaders {
    transmission: DynAccountReader<TransmissionState>,
    state: DynAccountReader<ConfigState>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    producer: DynProducer,
    metrics: DynMetrics,
    readers: Option<ChainReaders>,
}

impl Application {
    /// Create a new application.
    ///
    /// Records are logged and metrics go to the Prometheus registry unless
    /// replaced with `with_producer` / `with_metrics`. Chain readers must be
    /// injected with `with_readers` unless `feature.test_only_fake_readers`
    /// is set.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            producer: Arc::new(LogProducer),
            metrics: Arc::new(PrometheusMetrics),
            readers: None,
        })
    }

    /// Use these chain readers. Every monitor shares them through a
    /// coalescing wrapper.
    pub fn with_readers(
        mut self,
        transmission: DynAccountReader<TransmissionState>,
        state: DynAccountReader<ConfigState>,
    ) -> Self {
        self.readers = Some(ChainReaders { transmission, state });
        self
    }

    pub fn with_producer(mut self, producer: DynProducer) -> Self {
        self.producer = producer;
        self
    }

    pub fn with_metrics(mut self, metrics: DynMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Select the feed list source.
    pub fn feed_source(&self) -> AppResult<DynFeedSource> {
        let feeds = &self.config.feeds;

        if self.config.feature.test_only_fake_rdd {
            let count = self.config.feature.test_only_fake_rdd_feeds;
            warn!(count, "Using fake feed directory");
            return Ok(Arc::new(FakeRddSource::new(count)));
        }

        if let Some(url) = feeds.url.as_deref().filter(|u| !u.is_empty()) {
            info!(url, "Reading feeds from directory");
            return Ok(Arc::new(RddClient::new(url, feeds.read_timeout())?));
        }

        if let Some(path) = feeds.file_path.as_deref().filter(|p| !p.is_empty()) {
            info!(path, "Reading feeds from file");
            return Ok(Arc::new(FileFeedSource::new(path)));
        }

        if feeds.feeds.is_empty() {
            return Err(AppError::Config(
                "no feed source configured: set feeds.url, feeds.file_path or feeds.feeds"
                    .to_string(),
            ));
        }
        info!(count = feeds.feeds.len(), "Using static feed list");
        Ok(Arc::new(StaticFeedSource::new(feeds.feeds.clone())))
    }

    fn chain_readers(&self) -> AppResult<ChainReaders> {
        if let Some(readers) = &self.readers {
            return Ok(ChainReaders {
                transmission: Arc::new(CoalescingReader::new(readers.transmission.clone())),
                state: Arc::new(CoalescingReader::new(readers.state.clone())),
            });
        }

        if self.config.feature.test_only_fake_readers {
            warn!("Using fake chain readers");
            return Ok(ChainReaders {
                transmission: Arc::new(CoalescingReader::new(RandomTransmissionReader::new())),
                state: Arc::new(CoalescingReader::new(RandomStateReader::new())),
            });
        }

        Err(AppError::Config(format!(
            "no chain reader available for {}; inject readers or enable feature.test_only_fake_readers",
            self.config.solana.rpc_endpoint
        )))
    }

    /// Build the monitor factory. Chain readers are shared by every monitor.
    pub fn monitor_factory(&self) -> AppResult<DynMonitorFactory> {
        let readers = self.chain_readers()?;
        let schemas = Schemas::default();
        info!(
            config_set = %schemas.config_set.name(),
            config_set_simplified = %schemas.config_set_simplified.name(),
            transmission = %schemas.transmission.name(),
            registry_url = %self.config.schema_registry.url,
            "Encoding records with local JSON schemas"
        );

        Ok(Arc::new(FeedMonitorFactory::new(
            self.config.solana.clone(),
            readers.transmission,
            readers.state,
            self.producer.clone(),
            schemas,
            self.config.kafka.topics(),
            self.metrics.clone(),
            self.config.feature.verify_digest,
        )))
    }

    /// Run until the token is cancelled.
    ///
    /// Every monitor is stopped and joined before this returns.
    pub async fn run(self, token: CancellationToken) -> AppResult<()> {
        let source = self.feed_source()?;
        let factory = self.monitor_factory()?;
        let http_address = self.config.http_address()?;

        info!(
            network = %self.config.solana.network_name,
            chain_id = %self.config.solana.chain_id,
            poll_interval_ms = self.config.solana.poll_interval_ms,
            verify_digest = self.config.feature.verify_digest,
            "Starting application"
        );

        let feeds = &self.config.feeds;
        let (poller, updates) = SourcePoller::new(
            source,
            FEEDS_SOURCE,
            feeds.poll_interval(),
            feeds.read_timeout(),
            feeds.rdd_buffer_depth,
        );
        let manager = Manager::new(updates, factory, self.metrics.clone());

        let (ready_tx, ready_rx) = watch::channel(false);

        let server_token = CancellationToken::new();
        let server_handle = http_address.map(|addr| {
            let server_token = server_token.clone();
            tokio::spawn(async move {
                if let Err(e) = feedmon_telemetry::run_server(addr, ready_rx, server_token).await {
                    error!(error = %e, %addr, "HTTP server failed");
                }
            })
        });

        let poller_handle = tokio::spawn(poller.run(token.clone()));

        manager
            .run(token.clone(), move || {
                info!("First feed snapshot applied, ready");
                ready_tx.send_replace(true);
            })
            .await;

        // The manager also returns when the poller exits on its own.
        token.cancel();
        if let Err(e) = poller_handle.await {
            error!(error = %e, "Feed poller task failed");
        }

        server_token.cancel();
        if let Some(handle) = server_handle {
            if let Err(e) = handle.await {
                error!(error = %e, "HTTP server task failed");
            }
        }

        info!("Application stopped");
        Ok(())
    }
}
