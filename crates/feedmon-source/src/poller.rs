//! Periodic polling of a `Source` into a bounded channel.
//!
//! One poller runs as one task. Every tick produces exactly one outcome,
//! success or error, and outcomes are never dropped: when the consumer falls
//! behind, the poller blocks and its cadence slips.

use crate::error::SourceError;
use crate::source::Source;
use feedmon_core::ReadOutcome;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Smallest accepted poll interval. Zero would spin the ticker.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome type emitted by pollers.
pub type Outcome<T> = ReadOutcome<T, SourceError>;

/// Polls a source at a fixed interval and forwards timestamped outcomes.
pub struct SourcePoller<S: Source> {
    source: S,
    name: String,
    interval: Duration,
    read_timeout: Duration,
    buffer_depth: usize,
    tx: mpsc::Sender<Outcome<S::Output>>,
}

impl<S: Source> SourcePoller<S> {
    /// Create a poller and the receiving end of its outcome channel.
    ///
    /// `buffer_depth` 0 means synchronous handoff: after each push the poller
    /// waits until the consumer has taken the outcome before the next tick.
    pub fn new(
        source: S,
        name: impl Into<String>,
        interval: Duration,
        read_timeout: Duration,
        buffer_depth: usize,
    ) -> (Self, mpsc::Receiver<Outcome<S::Output>>) {
        let (tx, rx) = mpsc::channel(buffer_depth.max(1));
        let poller = Self {
            source,
            name: name.into(),
            interval: interval.max(MIN_POLL_INTERVAL),
            read_timeout,
            buffer_depth,
            tx,
        };
        (poller, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until the token is cancelled or the receiver is dropped.
    ///
    /// The first read happens immediately. Dropping `self` on return closes
    /// the outcome channel.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            source = %self.name,
            interval_ms = self.interval.as_millis() as u64,
            read_timeout_ms = self.read_timeout.as_millis() as u64,
            buffer_depth = self.buffer_depth,
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                () = token.cancelled() => break,
                res = timeout(self.read_timeout, self.source.fetch()) => match res {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(self.read_timeout)),
                },
            };

            if let Err(e) = &result {
                warn!(source = %self.name, error = %e, "Poll read failed");
            } else {
                trace!(source = %self.name, "Poll read succeeded");
            }

            if !self.push(ReadOutcome::new(result), &token).await {
                break;
            }
        }

        debug!(source = %self.name, "Poller stopped");
    }

    /// Hand one outcome to the consumer. Returns false when the poller
    /// should stop.
    async fn push(&self, outcome: Outcome<S::Output>, token: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = token.cancelled() => return false,
            res = self.tx.send(outcome) => {
                if res.is_err() {
                    debug!(source = %self.name, "Outcome receiver dropped");
                    return false;
                }
            }
        }

        if self.buffer_depth == 0 {
            // Capacity is one; it comes back only once the consumer has
            // received the outcome just sent.
            tokio::select! {
                biased;
                () = token.cancelled() => return false,
                permit = self.tx.reserve() => {
                    if permit.is_err() {
                        debug!(source = %self.name, "Outcome receiver dropped");
                        return false;
                    }
                }
            }
        }

        true
    }
}
