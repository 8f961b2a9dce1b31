//! Pollable sources and chain account readers.

use crate::error::SourceResult;
use feedmon_core::PublicKey;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Anything a `SourcePoller` can fetch on each tick.
pub trait Source: Send + Sync {
    type Output: Send + 'static;

    /// Fetch the current value. Implementations must not retry internally;
    /// the poller bounds each call with its read timeout.
    fn fetch(&self) -> BoxFuture<'_, SourceResult<Self::Output>>;
}

impl<S: Source + ?Sized> Source for Arc<S> {
    type Output = S::Output;

    fn fetch(&self) -> BoxFuture<'_, SourceResult<Self::Output>> {
        (**self).fetch()
    }
}

/// Reads and decodes one kind of on-chain account.
///
/// The transmission reader and the config (state) reader are two instances
/// shared by every feed monitor.
pub trait AccountReader: Send + Sync {
    /// `Clone + Sync` so concurrent callers can share one result.
    type Output: Clone + Send + Sync + 'static;

    fn read(&self, account: PublicKey) -> BoxFuture<'_, SourceResult<Self::Output>>;
}

impl<R: AccountReader + ?Sized> AccountReader for Arc<R> {
    type Output = R::Output;

    fn read(&self, account: PublicKey) -> BoxFuture<'_, SourceResult<Self::Output>> {
        (**self).read(account)
    }
}

/// Arc wrapper for AccountReader trait objects.
pub type DynAccountReader<T> = Arc<dyn AccountReader<Output = T>>;

/// Binds a shared reader to one account so it can be polled.
pub struct AccountSource<T> {
    reader: DynAccountReader<T>,
    account: PublicKey,
}

impl<T> AccountSource<T> {
    pub fn new(reader: DynAccountReader<T>, account: PublicKey) -> Self {
        Self { reader, account }
    }

    pub fn account(&self) -> PublicKey {
        self.account
    }
}

impl<T> Source for AccountSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn fetch(&self) -> BoxFuture<'_, SourceResult<T>> {
        self.reader.read(self.account)
    }
}
