//! Periodic source polling for the feed monitor.
//!
//! Turns anything readable (a chain account, the reference directory, a
//! local file) into a stream of timestamped read outcomes, and collapses
//! concurrent reads of the same chain account into one upstream call.

pub mod coalesce;
pub mod error;
pub mod fake;
pub mod poller;
pub mod source;

pub use coalesce::CoalescingReader;
pub use error::{SourceError, SourceResult};
pub use fake::{RandomStateReader, RandomTransmissionReader};
pub use poller::{Outcome, SourcePoller, MIN_POLL_INTERVAL};
pub use source::{AccountReader, AccountSource, BoxFuture, DynAccountReader, Source};
