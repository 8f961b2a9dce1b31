//! Feed discovery for the feed monitor.
//!
//! Every source here yields the complete current feed list on each fetch;
//! the manager diffs consecutive snapshots. Sources, in precedence order:
//! the reference data directory over HTTP, a local JSON file, a static list
//! from configuration. `FakeRddSource` stands in for the directory in tests.

pub mod client;
pub mod error;
pub mod fake;
pub mod file;
pub mod rdd;

pub use client::RddClient;
pub use error::{RegistryError, RegistryResult};
pub use fake::FakeRddSource;
pub use file::{FileFeedSource, StaticFeedSource};
pub use rdd::{parse_feeds, RawFeedEntry, DEAD_STATUS};
