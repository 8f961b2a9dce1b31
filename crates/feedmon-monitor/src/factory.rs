//! Monitor construction.

use crate::feed_monitor::FeedMonitor;
use feedmon_core::{ChainConfig, ConfigState, FeedConfig, TransmissionState};
use feedmon_export::{DynExporter, DynProducer, MetricsExporter, Schemas, TopicExporter, Topics};
use feedmon_source::{BoxFuture, DynAccountReader};
use feedmon_telemetry::DynMetrics;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds the task that monitors one feed.
///
/// The returned future runs until `token` is cancelled.
pub trait MonitorFactory: Send + Sync {
    fn run(&self, feed: FeedConfig, token: CancellationToken) -> BoxFuture<'static, ()>;
}

/// Arc wrapper for MonitorFactory trait objects.
pub type DynMonitorFactory = Arc<dyn MonitorFactory>;

/// Production factory. Every monitor shares the chain readers, the producer
/// and the metrics sink, and gets its own exporters.
pub struct FeedMonitorFactory {
    chain: ChainConfig,
    transmission_reader: DynAccountReader<TransmissionState>,
    state_reader: DynAccountReader<ConfigState>,
    producer: DynProducer,
    schemas: Schemas,
    topics: Topics,
    metrics: DynMetrics,
    verify_digest: bool,
}

impl FeedMonitorFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: ChainConfig,
        transmission_reader: DynAccountReader<TransmissionState>,
        state_reader: DynAccountReader<ConfigState>,
        producer: DynProducer,
        schemas: Schemas,
        topics: Topics,
        metrics: DynMetrics,
        verify_digest: bool,
    ) -> Self {
        Self {
            chain,
            transmission_reader,
            state_reader,
            producer,
            schemas,
            topics,
            metrics,
            verify_digest,
        }
    }

    /// Exporters for one feed, in export order.
    pub fn exporters(&self, feed: &FeedConfig) -> Vec<DynExporter> {
        vec![
            Arc::new(TopicExporter::new(
                self.chain.clone(),
                feed.clone(),
                self.producer.clone(),
                self.schemas.clone(),
                self.topics.clone(),
                self.metrics.clone(),
            )),
            Arc::new(MetricsExporter::new(feed.clone(), self.metrics.clone())),
        ]
    }

    pub fn build(&self, feed: FeedConfig) -> FeedMonitor {
        let exporters = self.exporters(&feed);
        FeedMonitor::new(
            feed,
            self.chain.clone(),
            self.transmission_reader.clone(),
            self.state_reader.clone(),
            exporters,
            self.metrics.clone(),
        )
        .with_digest_check(self.verify_digest)
    }
}

impl MonitorFactory for FeedMonitorFactory {
    fn run(&self, feed: FeedConfig, token: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(self.build(feed).run(token))
    }
}
