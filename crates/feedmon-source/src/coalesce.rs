//! Read coalescing for chain account readers.
//!
//! Every feed polls its accounts independently, so two monitors (or a
//! monitor and a restart of the same feed) can ask for the same account at
//! the same moment. `CoalescingReader` collapses concurrent reads of one
//! account into a single upstream call. It is not a cache: the in-flight
//! entry is removed as soon as the upstream call returns, or as soon as the
//! last caller stops waiting for it.

use crate::error::SourceResult;
use crate::source::{AccountReader, BoxFuture};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use feedmon_core::PublicKey;
use futures_util::future::{FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

type SharedRead<T> = Shared<BoxFuture<'static, SourceResult<T>>>;
type InFlightMap<T> = DashMap<PublicKey, InFlight<T>>;

/// One registered upstream read. `id` tells a leader's entry apart from a
/// later read of the same account.
struct InFlight<T> {
    id: u64,
    read: SharedRead<T>,
}

/// A caller's handle on an in-flight read.
///
/// Dropping the last handle before the read completes unregisters it, so an
/// abandoned read (timed out, cancelled) never captures later callers.
struct Waiter<T: Clone> {
    account: PublicKey,
    id: u64,
    read: SharedRead<T>,
    in_flight: Arc<InFlightMap<T>>,
}

impl<T: Clone> Drop for Waiter<T> {
    fn drop(&mut self) {
        // Runs under the shard lock, so no caller can join between the count
        // check and the removal. The map holds one clone, this waiter the
        // other; `None` means the read completed and removed itself.
        let removed = self.in_flight.remove_if(&self.account, |_, entry| {
            entry.id == self.id && entry.read.strong_count() == Some(2)
        });
        if removed.is_some() {
            trace!(account = %self.account, "Abandoned read released");
        }
    }
}

/// Wraps an `AccountReader` so concurrent reads of one account share a call.
pub struct CoalescingReader<R: AccountReader> {
    inner: Arc<R>,
    in_flight: Arc<InFlightMap<R::Output>>,
    next_id: AtomicU64,
}

impl<R: AccountReader> CoalescingReader<R> {
    pub fn new(inner: R) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<R>) -> Self {
        Self {
            inner,
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of accounts with a read currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl<R> AccountReader for CoalescingReader<R>
where
    R: AccountReader + 'static,
{
    type Output = R::Output;

    fn read(&self, account: PublicKey) -> BoxFuture<'_, SourceResult<R::Output>> {
        // The shard lock held by `entry` makes check-and-insert atomic.
        let (id, read) = match self.in_flight.entry(account) {
            Entry::Occupied(entry) => {
                trace!(%account, "Joining in-flight read");
                (entry.get().id, entry.get().read.clone())
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let inner = Arc::clone(&self.inner);
                let in_flight = Arc::clone(&self.in_flight);
                let upstream: BoxFuture<'static, SourceResult<R::Output>> = Box::pin(async move {
                    let result = inner.read(account).await;
                    // Remove before waiters observe the result so the next
                    // caller starts a fresh read.
                    in_flight.remove_if(&account, |_, entry| entry.id == id);
                    result
                });
                let read = upstream.shared();
                entry.insert(InFlight {
                    id,
                    read: read.clone(),
                });
                (id, read)
            }
        };

        let mut waiter = Waiter {
            account,
            id,
            read,
            in_flight: Arc::clone(&self.in_flight),
        };
        Box::pin(async move { (&mut waiter.read).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SlowReader {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SlowReader {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AccountReader for SlowReader {
        type Output = (PublicKey, usize);

        fn read(&self, account: PublicKey) -> BoxFuture<'_, SourceResult<(PublicKey, usize)>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                if self.fail {
                    return Err(SourceError::Read(format!("rpc unavailable ({n})")));
                }
                Ok((account, n))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_call() {
        let inner = Arc::new(SlowReader::default());
        let reader = CoalescingReader::from_arc(inner.clone());
        let account = PublicKey::new([1; 32]);

        let results = join_all((0..8).map(|_| reader.read(account))).await;

        assert_eq!(inner.calls(), 1);
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| *r == Ok((account, 0))));
        assert_eq!(reader.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_are_shared() {
        let inner = Arc::new(SlowReader {
            fail: true,
            ..Default::default()
        });
        let reader = CoalescingReader::from_arc(inner.clone());
        let account = PublicKey::new([2; 32]);

        let results = join_all((0..4).map(|_| reader.read(account))).await;

        assert_eq!(inner.calls(), 1);
        let first = results[0].clone();
        assert!(matches!(first, Err(SourceError::Read(_))));
        assert!(results.iter().all(|r| *r == first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_completion_is_fresh() {
        let inner = Arc::new(SlowReader::default());
        let reader = CoalescingReader::from_arc(inner.clone());
        let account = PublicKey::new([3; 32]);

        assert_eq!(reader.read(account).await, Ok((account, 0)));
        assert_eq!(reader.read(account).await, Ok((account, 1)));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_accounts_are_not_coalesced() {
        let inner = Arc::new(SlowReader::default());
        let reader = CoalescingReader::from_arc(inner.clone());
        let a = PublicKey::new([4; 32]);
        let b = PublicKey::new([5; 32]);

        let (ra, rb) = tokio::join!(reader.read(a), reader.read(b));

        assert_eq!(inner.calls(), 2);
        assert_eq!(ra.map(|(k, _)| k), Ok(a));
        assert_eq!(rb.map(|(k, _)| k), Ok(b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesces_across_tasks() {
        let inner = Arc::new(SlowReader::default());
        let reader = Arc::new(CoalescingReader::from_arc(inner.clone()));
        let account = PublicKey::new([6; 32]);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reader = Arc::clone(&reader);
                tokio::spawn(async move { reader.read(account).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok((account, 0)));
        }
        assert_eq!(inner.calls(), 1);
    }

    /// First call never returns, later calls answer at once.
    #[derive(Default)]
    struct HangOnceReader {
        calls: AtomicUsize,
    }

    impl AccountReader for HangOnceReader {
        type Output = usize;

        fn read(&self, _account: PublicKey) -> BoxFuture<'_, SourceResult<usize>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(n)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_read_is_released() {
        let inner = Arc::new(HangOnceReader::default());
        let reader = CoalescingReader::from_arc(inner.clone());
        let account = PublicKey::new([7; 32]);

        let timed_out = tokio::time::timeout(Duration::from_millis(50), reader.read(account)).await;
        assert!(timed_out.is_err());
        assert_eq!(reader.in_flight(), 0);

        assert_eq!(reader.read(account).await, Ok(1));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reader.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_waiter_keeps_read_registered() {
        let inner = Arc::new(SlowReader::default());
        let reader = CoalescingReader::from_arc(inner.clone());
        let account = PublicKey::new([8; 32]);

        let mut first = tokio_test::task::spawn(reader.read(account));
        let mut second = tokio_test::task::spawn(reader.read(account));
        tokio_test::assert_pending!(first.poll());
        tokio_test::assert_pending!(second.poll());

        drop(first);
        assert_eq!(reader.in_flight(), 1);

        // A caller arriving now still joins the running read.
        let third = reader.read(account);
        let (second, third) = tokio::join!(second, third);
        assert_eq!(second, Ok((account, 0)));
        assert_eq!(third, Ok((account, 0)));
        assert_eq!(inner.calls(), 1);
        assert_eq!(reader.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_recovers_after_hung_read() {
        use crate::poller::SourcePoller;
        use crate::source::{AccountSource, DynAccountReader};
        use tokio_util::sync::CancellationToken;

        let inner = Arc::new(HangOnceReader::default());
        let reader = Arc::new(CoalescingReader::from_arc(inner.clone()));
        let account = PublicKey::new([9; 32]);
        let source = AccountSource::new(reader.clone() as DynAccountReader<usize>, account);

        let (poller, mut rx) = SourcePoller::new(
            source,
            "state",
            Duration::from_millis(100),
            Duration::from_millis(50),
            0,
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(poller.run(token.clone()));

        let first = rx.recv().await.unwrap();
        assert!(matches!(first.result, Err(SourceError::Timeout(_))));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.result, Ok(1));

        token.cancel();
        handle.await.unwrap();
        assert_eq!(reader.in_flight(), 0);
    }
}
