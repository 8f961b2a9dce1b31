//! Per-feed gauges fed from envelopes.

use crate::exporter::{BoxFuture, Exporter};
use feedmon_core::{Envelope, FeedConfig};
use feedmon_telemetry::DynMetrics;

/// Mirrors the latest observed values of one feed into metrics.
pub struct MetricsExporter {
    feed: FeedConfig,
    metrics: DynMetrics,
}

impl MetricsExporter {
    pub fn new(feed: FeedConfig, metrics: DynMetrics) -> Self {
        Self { feed, metrics }
    }
}

impl Exporter for MetricsExporter {
    fn export<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, ()> {
        match envelope {
            Envelope::State(env) => self.metrics.state_observed(&self.feed, &env.state),
            Envelope::Transmission(env) => self
                .metrics
                .transmission_observed(&self.feed, &env.transmission),
        }
        Box::pin(async {})
    }

    fn cleanup(&self) -> BoxFuture<'_, ()> {
        self.metrics.remove_feed(&self.feed);
        Box::pin(async {})
    }
}
