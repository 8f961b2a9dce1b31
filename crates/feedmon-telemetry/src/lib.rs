//! Prometheus metrics, structured logging and health checks for feedmon.
//!
//! Components record metrics through the `MonitorMetrics` trait object they
//! are handed at construction: `PrometheusMetrics` in the binary,
//! `NoopMetrics` or `RecordingMetrics` in tests.

pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{
    DynMetrics, Metrics, MonitorMetrics, NoopMetrics, PrometheusMetrics, RecordingMetrics,
};
pub use server::{create_router, run_server};
