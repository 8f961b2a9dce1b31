//! Prometheus metrics for the feed monitor.
//!
//! Two groups of series:
//! - service health: poll outcomes per source, export outcomes per topic,
//!   running monitors, monitor starts and stops, digest mismatches
//! - per-feed observations: latest answer, round, epoch, block heights,
//!   answer timestamp, oracle count, labelled by feed name and state account
//!
//! Per-feed series are removed when the feed's monitor stops so churned
//! feeds do not leave stale values behind.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure (duplicate
//! metric names) is a programming error and crashes on first use.

use crate::error::{TelemetryError, TelemetryResult};
use feedmon_core::{ConfigState, FeedConfig, FeedKey, TransmissionState};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_int_gauge, CounterVec, Encoder, GaugeVec,
    IntGauge, TextEncoder,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FEED_LABELS: &[&str] = &["feed_name", "state_account"];

/// Poll outcomes. Labels: source, result (ok/timeout/read).
pub static POLL_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feedmon_poll_outcomes_total",
        "Total poll outcomes by source and result",
        &["source", "result"]
    )
    .unwrap()
});

/// Export outcomes. Labels: topic, result (ok/error).
pub static EXPORTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feedmon_exports_total",
        "Total exported records by topic and result",
        &["topic", "result"]
    )
    .unwrap()
});

/// Number of feed monitors currently running.
pub static RUNNING_FEEDS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("feedmon_running_feeds", "Feed monitors currently running").unwrap()
});

/// Monitor lifecycle events. Labels: event (started/stopped).
pub static MONITOR_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feedmon_monitor_events_total",
        "Feed monitor starts and stops",
        &["event"]
    )
    .unwrap()
});

pub static DIGEST_MISMATCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feedmon_config_digest_mismatch_total",
        "Advertised config digest differs from the recomputed one",
        FEED_LABELS
    )
    .unwrap()
});

pub static FEED_LATEST_ANSWER: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "feedmon_feed_latest_answer",
        "Latest raw answer reported by the feed",
        FEED_LABELS
    )
    .unwrap()
});

pub static FEED_ROUND_ID: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("feedmon_feed_round_id", "Latest round id", FEED_LABELS).unwrap()
});

pub static FEED_EPOCH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("feedmon_feed_epoch", "Latest epoch", FEED_LABELS).unwrap()
});

pub static FEED_ANSWER_TIMESTAMP: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "feedmon_feed_answer_timestamp_seconds",
        "Unix time reported with the latest answer",
        FEED_LABELS
    )
    .unwrap()
});

pub static FEED_TRANSMISSION_BLOCK_HEIGHT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "feedmon_feed_transmission_block_height",
        "Chain height of the latest transmissions account read",
        FEED_LABELS
    )
    .unwrap()
});

pub static FEED_STATE_BLOCK_HEIGHT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "feedmon_feed_state_block_height",
        "Chain height of the latest state account read",
        FEED_LABELS
    )
    .unwrap()
});

pub static FEED_ORACLE_COUNT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "feedmon_feed_oracle_count",
        "Number of oracles in the configured set",
        FEED_LABELS
    )
    .unwrap()
});

fn per_feed_gauges() -> [&'static GaugeVec; 7] {
    [
        &*FEED_LATEST_ANSWER,
        &*FEED_ROUND_ID,
        &*FEED_EPOCH,
        &*FEED_ANSWER_TIMESTAMP,
        &*FEED_TRANSMISSION_BLOCK_HEIGHT,
        &*FEED_STATE_BLOCK_HEIGHT,
        &*FEED_ORACLE_COUNT,
    ]
}

fn feed_labels(feed: &FeedConfig) -> [String; 2] {
    [feed.feed_name.clone(), feed.state_account.to_base58()]
}

/// Static helpers over the registered series.
pub struct Metrics;

impl Metrics {
    pub fn poll_outcome(source: &str, result: &str) {
        POLL_OUTCOMES_TOTAL.with_label_values(&[source, result]).inc();
    }

    pub fn export_outcome(topic: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        EXPORTS_TOTAL.with_label_values(&[topic, result]).inc();
    }

    pub fn set_running_feeds(count: usize) {
        RUNNING_FEEDS.set(count as i64);
    }

    pub fn monitor_event(event: &str) {
        MONITOR_EVENTS_TOTAL.with_label_values(&[event]).inc();
    }

    pub fn digest_mismatch(feed: &FeedConfig) {
        let [name, account] = feed_labels(feed);
        DIGEST_MISMATCH_TOTAL
            .with_label_values(&[name.as_str(), account.as_str()])
            .inc();
    }

    pub fn transmission_observed(feed: &FeedConfig, tx: &TransmissionState) {
        let [name, account] = feed_labels(feed);
        let labels = [name.as_str(), account.as_str()];
        FEED_LATEST_ANSWER.with_label_values(&labels).set(tx.answer as f64);
        FEED_ROUND_ID.with_label_values(&labels).set(f64::from(tx.round_id));
        FEED_EPOCH.with_label_values(&labels).set(f64::from(tx.epoch));
        FEED_ANSWER_TIMESTAMP
            .with_label_values(&labels)
            .set(f64::from(tx.timestamp));
        FEED_TRANSMISSION_BLOCK_HEIGHT
            .with_label_values(&labels)
            .set(tx.block_height as f64);
    }

    pub fn state_observed(feed: &FeedConfig, state: &ConfigState) {
        let [name, account] = feed_labels(feed);
        let labels = [name.as_str(), account.as_str()];
        FEED_ORACLE_COUNT
            .with_label_values(&labels)
            .set(state.oracles.len() as f64);
        FEED_STATE_BLOCK_HEIGHT
            .with_label_values(&labels)
            .set(state.block_height as f64);
    }

    /// Drop every per-feed series of `feed`.
    pub fn remove_feed(feed: &FeedConfig) {
        let [name, account] = feed_labels(feed);
        let labels = [name.as_str(), account.as_str()];
        for gauge in per_feed_gauges() {
            // Absent series are fine: the feed may never have reported.
            let _ = gauge.remove_label_values(&labels);
        }
        let _ = DIGEST_MISMATCH_TOTAL.remove_label_values(&labels);
    }

    /// Render the default registry in the Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

/// Metrics sink injected into pollers, monitors, exporters and the manager.
pub trait MonitorMetrics: Send + Sync {
    /// `result` is "ok" or the error kind.
    fn poll_outcome(&self, source: &str, result: &str);
    fn export_outcome(&self, topic: &str, ok: bool);
    fn set_running_feeds(&self, count: usize);
    fn monitor_started(&self, feed: &FeedConfig);
    fn monitor_stopped(&self, feed: &FeedConfig);
    fn transmission_observed(&self, feed: &FeedConfig, tx: &TransmissionState);
    fn state_observed(&self, feed: &FeedConfig, state: &ConfigState);
    fn digest_mismatch(&self, feed: &FeedConfig);
    fn remove_feed(&self, feed: &FeedConfig);
}

/// Arc wrapper for MonitorMetrics trait objects.
pub type DynMetrics = Arc<dyn MonitorMetrics>;

/// Records into the process-wide Prometheus registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MonitorMetrics for PrometheusMetrics {
    fn poll_outcome(&self, source: &str, result: &str) {
        Metrics::poll_outcome(source, result);
    }

    fn export_outcome(&self, topic: &str, ok: bool) {
        Metrics::export_outcome(topic, ok);
    }

    fn set_running_feeds(&self, count: usize) {
        Metrics::set_running_feeds(count);
    }

    fn monitor_started(&self, _feed: &FeedConfig) {
        Metrics::monitor_event("started");
    }

    fn monitor_stopped(&self, _feed: &FeedConfig) {
        Metrics::monitor_event("stopped");
    }

    fn transmission_observed(&self, feed: &FeedConfig, tx: &TransmissionState) {
        Metrics::transmission_observed(feed, tx);
    }

    fn state_observed(&self, feed: &FeedConfig, state: &ConfigState) {
        Metrics::state_observed(feed, state);
    }

    fn digest_mismatch(&self, feed: &FeedConfig) {
        Metrics::digest_mismatch(feed);
    }

    fn remove_feed(&self, feed: &FeedConfig) {
        Metrics::remove_feed(feed);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MonitorMetrics for NoopMetrics {
    fn poll_outcome(&self, _source: &str, _result: &str) {}
    fn export_outcome(&self, _topic: &str, _ok: bool) {}
    fn set_running_feeds(&self, _count: usize) {}
    fn monitor_started(&self, _feed: &FeedConfig) {}
    fn monitor_stopped(&self, _feed: &FeedConfig) {}
    fn transmission_observed(&self, _feed: &FeedConfig, _tx: &TransmissionState) {}
    fn state_observed(&self, _feed: &FeedConfig, _state: &ConfigState) {}
    fn digest_mismatch(&self, _feed: &FeedConfig) {}
    fn remove_feed(&self, _feed: &FeedConfig) {}
}

/// In-memory metrics for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    poll_outcomes: Mutex<Vec<(String, String)>>,
    exports: Mutex<Vec<(String, bool)>>,
    running_feeds: AtomicUsize,
    started: Mutex<Vec<FeedKey>>,
    stopped: Mutex<Vec<FeedKey>>,
    transmissions: AtomicUsize,
    states: AtomicUsize,
    digest_mismatches: AtomicUsize,
    removed: Mutex<Vec<FeedKey>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_outcomes(&self) -> Vec<(String, String)> {
        self.poll_outcomes.lock().clone()
    }

    pub fn exports(&self) -> Vec<(String, bool)> {
        self.exports.lock().clone()
    }

    pub fn running_feeds(&self) -> usize {
        self.running_feeds.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<FeedKey> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<FeedKey> {
        self.stopped.lock().clone()
    }

    pub fn transmissions(&self) -> usize {
        self.transmissions.load(Ordering::SeqCst)
    }

    pub fn states(&self) -> usize {
        self.states.load(Ordering::SeqCst)
    }

    pub fn digest_mismatches(&self) -> usize {
        self.digest_mismatches.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> Vec<FeedKey> {
        self.removed.lock().clone()
    }
}

impl MonitorMetrics for RecordingMetrics {
    fn poll_outcome(&self, source: &str, result: &str) {
        self.poll_outcomes
            .lock()
            .push((source.to_string(), result.to_string()));
    }

    fn export_outcome(&self, topic: &str, ok: bool) {
        self.exports.lock().push((topic.to_string(), ok));
    }

    fn set_running_feeds(&self, count: usize) {
        self.running_feeds.store(count, Ordering::SeqCst);
    }

    fn monitor_started(&self, feed: &FeedConfig) {
        self.started.lock().push(feed.key());
    }

    fn monitor_stopped(&self, feed: &FeedConfig) {
        self.stopped.lock().push(feed.key());
    }

    fn transmission_observed(&self, _feed: &FeedConfig, _tx: &TransmissionState) {
        self.transmissions.fetch_add(1, Ordering::SeqCst);
    }

    fn state_observed(&self, _feed: &FeedConfig, _state: &ConfigState) {
        self.states.fetch_add(1, Ordering::SeqCst);
    }

    fn digest_mismatch(&self, _feed: &FeedConfig) {
        self.digest_mismatches.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_feed(&self, feed: &FeedConfig) {
        self.removed.lock().push(feed.key());
    }
}
