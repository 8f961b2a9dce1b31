//! Per-feed monitor.
//!
//! Polls the feed's transmissions and state accounts on two independent
//! pollers and exports every successful read. A failed read is logged and
//! skipped; the next tick tries again.

use crate::error::MonitorResult;
use chrono::{DateTime, Utc};
use feedmon_core::{
    verify_config_digest, ChainConfig, ConfigDigest, ConfigState, Envelope, FeedConfig,
    StateEnvelope, TransmissionEnvelope, TransmissionState,
};
use feedmon_export::DynExporter;
use feedmon_source::{AccountSource, DynAccountReader, Outcome, SourcePoller};
use feedmon_telemetry::DynMetrics;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Metrics source label of transmissions account polls.
pub const TRANSMISSION_SOURCE: &str = "transmission";
/// Metrics source label of state account polls.
pub const STATE_SOURCE: &str = "state";

pub struct FeedMonitor {
    feed: FeedConfig,
    chain: ChainConfig,
    transmission_reader: DynAccountReader<TransmissionState>,
    state_reader: DynAccountReader<ConfigState>,
    exporters: Vec<DynExporter>,
    metrics: DynMetrics,
    verify_digest: bool,
}

impl FeedMonitor {
    pub fn new(
        feed: FeedConfig,
        chain: ChainConfig,
        transmission_reader: DynAccountReader<TransmissionState>,
        state_reader: DynAccountReader<ConfigState>,
        exporters: Vec<DynExporter>,
        metrics: DynMetrics,
    ) -> Self {
        Self {
            feed,
            chain,
            transmission_reader,
            state_reader,
            exporters,
            metrics,
            verify_digest: false,
        }
    }

    /// Recompute the config digest of every state read and report mismatches.
    pub fn with_digest_check(mut self, enabled: bool) -> Self {
        self.verify_digest = enabled;
        self
    }

    pub fn feed(&self) -> &FeedConfig {
        &self.feed
    }

    /// Run until the token is cancelled.
    ///
    /// Returns only after both pollers and both handlers have exited and
    /// every exporter has been cleaned up.
    pub async fn run(self, token: CancellationToken) {
        let span = info_span!(
            "feed_monitor",
            feed = %self.feed.feed_name,
            state_account = %self.feed.state_account,
        );
        self.run_inner(token).instrument(span).await;
    }

    async fn run_inner(self, token: CancellationToken) {
        info!("Feed monitor started");

        let (transmission_poller, transmission_rx) = SourcePoller::new(
            AccountSource::new(
                self.transmission_reader.clone(),
                self.feed.transmissions_account,
            ),
            TRANSMISSION_SOURCE,
            self.chain.poll_interval(),
            self.chain.read_timeout(),
            self.chain.buffer_depth,
        );
        let (state_poller, state_rx) = SourcePoller::new(
            AccountSource::new(self.state_reader.clone(), self.feed.state_account),
            STATE_SOURCE,
            self.chain.poll_interval(),
            self.chain.read_timeout(),
            self.chain.buffer_depth,
        );

        let pollers = [
            tokio::spawn(transmission_poller.run(token.clone()).in_current_span()),
            tokio::spawn(state_poller.run(token.clone()).in_current_span()),
        ];

        tokio::join!(
            self.consume(TRANSMISSION_SOURCE, transmission_rx, &token, |tx, at| {
                TransmissionEnvelope::new(tx, at).into()
            }),
            self.consume(STATE_SOURCE, state_rx, &token, |state, at| {
                if self.verify_digest {
                    self.check_digest(&state);
                }
                StateEnvelope::new(state, at).into()
            }),
        );

        for poller in pollers {
            if let Err(e) = poller.await {
                error!(error = %e, "Poller task failed");
            }
        }

        for exporter in &self.exporters {
            exporter.cleanup().await;
        }

        info!("Feed monitor stopped");
    }

    /// Handle outcomes of one poller until it closes or the token fires.
    async fn consume<T, F>(
        &self,
        source: &'static str,
        mut rx: mpsc::Receiver<Outcome<T>>,
        token: &CancellationToken,
        to_envelope: F,
    ) where
        F: Fn(T, DateTime<Utc>) -> Envelope,
    {
        loop {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => break,
                outcome = rx.recv() => match outcome {
                    Some(outcome) => outcome,
                    None => break,
                },
            };

            match outcome.result {
                Ok(value) => {
                    self.metrics.poll_outcome(source, "ok");
                    let envelope = to_envelope(value, outcome.observed_at);
                    self.export(&envelope).await;
                }
                Err(e) => {
                    self.metrics.poll_outcome(source, e.kind());
                    warn!(source, error = %e, "Account read failed, skipping export");
                }
            }
        }
        debug!(source, "Handler stopped");
    }

    async fn export(&self, envelope: &Envelope) {
        trace!(kind = envelope.kind(), "Exporting envelope");
        for exporter in &self.exporters {
            exporter.export(envelope).await;
        }
    }

    fn check_digest(&self, state: &ConfigState) {
        match self.verify_digest_of(state) {
            Ok(digest) => trace!(%digest, "Config digest verified"),
            Err(e) => {
                self.metrics.digest_mismatch(&self.feed);
                error!(error = %e, "Config digest check failed");
            }
        }
    }

    fn verify_digest_of(&self, state: &ConfigState) -> MonitorResult<ConfigDigest> {
        Ok(verify_config_digest(
            self.feed.contract_address,
            &self.feed.state_account,
            state,
        )?)
    }
}
