//! Feed monitor lifecycle.
//!
//! The `Manager` consumes feed-list snapshots and keeps exactly one
//! `FeedMonitor` task running per feed in the latest snapshot. Each monitor
//! polls its feed's two accounts and hands every successful read to its
//! exporters.

pub mod error;
pub mod factory;
pub mod feed_monitor;
pub mod manager;

pub use error::{MonitorError, MonitorResult};
pub use factory::{DynMonitorFactory, FeedMonitorFactory, MonitorFactory};
pub use feed_monitor::{FeedMonitor, STATE_SOURCE, TRANSMISSION_SOURCE};
pub use manager::{Manager, FEEDS_SOURCE};
