//! On-chain price feed monitor.
//!
//! Wires the pieces together:
//! - feed discovery (reference directory, file, static list or fake)
//! - the manager, which keeps one monitor per discovered feed
//! - chain readers shared by every monitor, with read coalescing
//! - exporters publishing config and transmission records
//! - the metrics and health HTTP server

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
