//! Feed monitor manager.
//!
//! Owns the set of running monitors. Each successful feed-list snapshot is
//! diffed against the running set: monitors for vanished feeds are stopped
//! (and joined), monitors for new feeds are started, everything else is left
//! alone. Snapshots are applied strictly one at a time in arrival order.

use crate::error::MonitorResult;
use crate::factory::DynMonitorFactory;
use feedmon_core::{FeedConfig, FeedKey};
use feedmon_source::Outcome;
use feedmon_telemetry::DynMetrics;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Metrics source label of feed-list polls.
pub const FEEDS_SOURCE: &str = "feeds";

struct RunningMonitor {
    feed: FeedConfig,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningMonitor {
    /// Cancel the monitor and wait for it to exit.
    async fn stop(self) -> MonitorResult<FeedConfig> {
        self.token.cancel();
        self.handle.await?;
        Ok(self.feed)
    }
}

pub struct Manager {
    updates: mpsc::Receiver<Outcome<Vec<FeedConfig>>>,
    factory: DynMonitorFactory,
    metrics: DynMetrics,
    running: HashMap<FeedKey, RunningMonitor>,
    running_tx: watch::Sender<BTreeSet<FeedKey>>,
}

impl Manager {
    pub fn new(
        updates: mpsc::Receiver<Outcome<Vec<FeedConfig>>>,
        factory: DynMonitorFactory,
        metrics: DynMetrics,
    ) -> Self {
        let (running_tx, _) = watch::channel(BTreeSet::new());
        Self {
            updates,
            factory,
            metrics,
            running: HashMap::new(),
            running_tx,
        }
    }

    /// Subscribe to the running set, published after every applied snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<FeedKey>> {
        self.running_tx.subscribe()
    }

    /// Consume snapshots until the token is cancelled or the update channel
    /// closes, then stop every monitor.
    ///
    /// `on_ready` is called once, after the first snapshot has been applied.
    pub async fn run<F>(mut self, token: CancellationToken, on_ready: F)
    where
        F: FnOnce() + Send,
    {
        let mut on_ready = Some(on_ready);
        info!("Manager started");

        loop {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => break,
                outcome = self.updates.recv() => match outcome {
                    Some(outcome) => outcome,
                    None => {
                        info!("Feed updates closed");
                        break;
                    }
                },
            };

            match outcome.result {
                Ok(feeds) => {
                    self.metrics.poll_outcome(FEEDS_SOURCE, "ok");
                    self.apply(feeds, &token).await;
                    if let Some(ready) = on_ready.take() {
                        ready();
                    }
                }
                Err(e) => {
                    self.metrics.poll_outcome(FEEDS_SOURCE, e.kind());
                    warn!(
                        error = %e,
                        running = self.running.len(),
                        "Failed to fetch feed list, keeping running monitors"
                    );
                }
            }
        }

        self.stop_all().await;
        info!("Manager stopped");
    }

    async fn apply(&mut self, feeds: Vec<FeedConfig>, token: &CancellationToken) {
        let snapshot = dedupe(feeds);
        let wanted: HashSet<FeedKey> = snapshot.iter().map(FeedConfig::key).collect();

        let to_stop: Vec<FeedKey> = self
            .running
            .keys()
            .filter(|key| !wanted.contains(key))
            .copied()
            .collect();
        for key in &to_stop {
            if let Some(monitor) = self.running.remove(key) {
                self.stop_monitor(monitor).await;
            }
        }

        let mut started = 0usize;
        for feed in snapshot {
            let key = feed.key();
            if !self.running.contains_key(&key) {
                self.start_monitor(key, feed, token);
                started += 1;
            }
        }

        if started > 0 || !to_stop.is_empty() {
            info!(
                started,
                stopped = to_stop.len(),
                running = self.running.len(),
                "Applied feed snapshot"
            );
        } else {
            debug!(running = self.running.len(), "Feed snapshot unchanged");
        }
        self.publish();
    }

    fn start_monitor(&mut self, key: FeedKey, feed: FeedConfig, token: &CancellationToken) {
        let child = token.child_token();
        let handle = tokio::spawn(self.factory.run(feed.clone(), child.clone()));
        info!(feed = %feed.feed_name, %key, "Started feed monitor");
        self.metrics.monitor_started(&feed);
        self.running.insert(
            key,
            RunningMonitor {
                feed,
                token: child,
                handle,
            },
        );
    }

    async fn stop_monitor(&self, monitor: RunningMonitor) {
        let feed = monitor.feed.clone();
        match monitor.stop().await {
            Ok(_) => info!(feed = %feed.feed_name, key = %feed.key(), "Stopped feed monitor"),
            Err(e) => error!(feed = %feed.feed_name, error = %e, "Feed monitor exited abnormally"),
        }
        self.metrics.monitor_stopped(&feed);
    }

    async fn stop_all(&mut self) {
        let monitors: Vec<RunningMonitor> = self.running.drain().map(|(_, m)| m).collect();
        if monitors.is_empty() {
            self.publish();
            return;
        }

        info!(count = monitors.len(), "Stopping all feed monitors");
        for monitor in &monitors {
            monitor.token.cancel();
        }
        for monitor in monitors {
            self.stop_monitor(monitor).await;
        }
        self.publish();
    }

    fn publish(&self) {
        self.metrics.set_running_feeds(self.running.len());
        self.running_tx
            .send_replace(self.running.keys().copied().collect());
    }
}

/// Drop repeated feeds, keeping the first occurrence.
fn dedupe(feeds: Vec<FeedConfig>) -> Vec<FeedConfig> {
    let mut seen = HashSet::with_capacity(feeds.len());
    feeds
        .into_iter()
        .filter(|feed| {
            let fresh = seen.insert(feed.key());
            if !fresh {
                warn!(feed = %feed.feed_name, key = %feed.key(), "Duplicate feed in snapshot, ignoring");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::MonitorFactory;
    use feedmon_core::{PublicKey, ReadOutcome};
    use feedmon_source::{BoxFuture, SourceError};
    use feedmon_telemetry::RecordingMetrics;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Log {
        next_instance: AtomicUsize,
        runs: Mutex<Vec<(FeedKey, usize)>>,
        exits: Mutex<Vec<(FeedKey, usize)>>,
    }

    impl Log {
        fn runs_of(&self, key: FeedKey) -> Vec<usize> {
            self.runs
                .lock()
                .iter()
                .filter(|(k, _)| *k == key)
                .map(|(_, i)| *i)
                .collect()
        }

        fn exited(&self, key: FeedKey) -> bool {
            self.exits.lock().iter().any(|(k, _)| *k == key)
        }
    }

    /// Monitors that just wait for cancellation, recording their lifetime.
    struct RecordingFactory {
        log: Arc<Log>,
    }

    impl MonitorFactory for RecordingFactory {
        fn run(&self, feed: FeedConfig, token: CancellationToken) -> BoxFuture<'static, ()> {
            let log = Arc::clone(&self.log);
            let instance = log.next_instance.fetch_add(1, Ordering::SeqCst);
            log.runs.lock().push((feed.key(), instance));
            Box::pin(async move {
                token.cancelled().await;
                tokio::task::yield_now().await;
                log.exits.lock().push((feed.key(), instance));
            })
        }
    }

    fn feed(b: u8) -> FeedConfig {
        FeedConfig {
            feed_name: format!("FEED{b}"),
            feed_path: String::new(),
            symbol: "$".to_string(),
            heartbeat_sec: 0,
            contract_type: "ocr2".to_string(),
            contract_status: "live".to_string(),
            multiply: 1,
            contract_address: PublicKey::new([1; 32]),
            transmissions_account: PublicKey::new([b; 32]),
            state_account: PublicKey::new([b.wrapping_add(100); 32]),
        }
    }

    fn keys(feeds: &[FeedConfig]) -> BTreeSet<FeedKey> {
        feeds.iter().map(FeedConfig::key).collect()
    }

    fn ok(feeds: Vec<FeedConfig>) -> Outcome<Vec<FeedConfig>> {
        ReadOutcome::new(Ok(feeds))
    }

    struct Harness {
        updates: mpsc::Sender<Outcome<Vec<FeedConfig>>>,
        running: watch::Receiver<BTreeSet<FeedKey>>,
        log: Arc<Log>,
        metrics: Arc<RecordingMetrics>,
        ready: Arc<AtomicUsize>,
        token: CancellationToken,
        handle: JoinHandle<()>,
    }

    impl Harness {
        fn start() -> Self {
            let (updates, rx) = mpsc::channel(1);
            let log = Arc::new(Log::default());
            let metrics = Arc::new(RecordingMetrics::new());
            let manager = Manager::new(
                rx,
                Arc::new(RecordingFactory { log: log.clone() }),
                metrics.clone(),
            );
            let running = manager.subscribe();
            let ready = Arc::new(AtomicUsize::new(0));
            let token = CancellationToken::new();
            let ready_hook = ready.clone();
            let handle = tokio::spawn(manager.run(token.clone(), move || {
                ready_hook.fetch_add(1, Ordering::SeqCst);
            }));
            Self {
                updates,
                running,
                log,
                metrics,
                ready,
                token,
                handle,
            }
        }

        /// Send a snapshot and wait until it has been applied.
        async fn apply(&mut self, feeds: Vec<FeedConfig>) -> BTreeSet<FeedKey> {
            self.updates.send(ok(feeds)).await.unwrap();
            self.running.changed().await.unwrap();
            self.running.borrow_and_update().clone()
        }

        async fn shutdown(self) {
            self.token.cancel();
            self.handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_running_set_matches_every_snapshot() {
        let mut h = Harness::start();
        let sequence = vec![
            vec![feed(1), feed(2), feed(3)],
            vec![feed(2), feed(3), feed(4)],
            vec![],
            vec![feed(5)],
            vec![feed(1), feed(2), feed(3), feed(4), feed(5)],
            vec![feed(3)],
        ];

        for snapshot in sequence {
            let running = h.apply(snapshot.clone()).await;
            assert_eq!(running, keys(&snapshot));
            assert_eq!(h.metrics.running_feeds(), snapshot.len());
        }

        let starts = h.log.runs.lock().len();
        let exits = h.log.exits.lock().len();
        assert_eq!(starts - exits, 1);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_unchanged_feeds_keep_their_instance() {
        let mut h = Harness::start();
        let (a, b) = (feed(1), feed(2));

        h.apply(vec![a.clone()]).await;
        h.apply(vec![a.clone(), b.clone()]).await;
        assert_eq!(h.log.runs_of(a.key()).len(), 1);
        assert!(!h.log.exited(a.key()));

        let running = h.apply(vec![b.clone()]).await;
        assert_eq!(running, keys(&[b.clone()]));
        // Stopped monitors are joined before the snapshot counts as applied.
        assert!(h.log.exited(a.key()));
        assert_eq!(h.log.runs_of(a.key()).len(), 1);
        assert_eq!(h.log.runs_of(b.key()).len(), 1);
        assert!(!h.log.exited(b.key()));

        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_errored_snapshot_keeps_running_set() {
        let mut h = Harness::start();
        h.apply(vec![feed(1), feed(2)]).await;

        h.updates
            .send(ReadOutcome::new(Err(SourceError::Read("directory down".to_string()))))
            .await
            .unwrap();
        let running = h.apply(vec![feed(1), feed(2)]).await;

        assert_eq!(running, keys(&[feed(1), feed(2)]));
        assert_eq!(h.log.runs.lock().len(), 2);
        assert!(h.log.exits.lock().is_empty());
        assert!(h
            .metrics
            .poll_outcomes()
            .contains(&(FEEDS_SOURCE.to_string(), "read".to_string())));
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicates_start_one_monitor() {
        let mut h = Harness::start();
        let mut renamed = feed(1);
        renamed.feed_name = "renamed".to_string();

        let running = h.apply(vec![feed(1), renamed, feed(1)]).await;
        assert_eq!(running.len(), 1);
        assert_eq!(h.log.runs.lock().len(), 1);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_ready_fires_once_after_first_snapshot() {
        let mut h = Harness::start();
        h.updates
            .send(ReadOutcome::new(Err(SourceError::Timeout(
                std::time::Duration::from_secs(1),
            ))))
            .await
            .unwrap();
        h.apply(vec![feed(1)]).await;
        assert_eq!(h.ready.load(Ordering::SeqCst), 1);

        h.apply(vec![feed(2)]).await;
        assert_eq!(h.ready.load(Ordering::SeqCst), 1);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancellation_stops_and_joins_all() {
        let mut h = Harness::start();
        h.apply(vec![feed(1), feed(2), feed(3)]).await;

        let log = h.log.clone();
        let metrics = h.metrics.clone();
        let mut running = h.running.clone();
        h.shutdown().await;

        assert_eq!(log.exits.lock().len(), 3);
        assert_eq!(metrics.stopped().len(), 3);
        assert_eq!(metrics.running_feeds(), 0);
        assert!(running.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn test_closed_updates_stop_manager() {
        let mut h = Harness::start();
        h.apply(vec![feed(1)]).await;

        let Harness {
            updates,
            log,
            handle,
            ..
        } = h;
        drop(updates);
        handle.await.unwrap();
        assert!(log.exited(feed(1).key()));
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let mut second = feed(1);
        second.feed_name = "second".to_string();
        let out = dedupe(vec![feed(1), feed(2), second]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].feed_name, "FEED1");
    }
}
