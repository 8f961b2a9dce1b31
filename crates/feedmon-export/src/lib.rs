//! Export of feed snapshots to downstream topics.
//!
//! An envelope goes through one pipeline per record kind: map it to a
//! record, encode the record with the topic's schema, publish the bytes
//! keyed by the feed's state account. Pipelines fail independently and
//! never propagate errors to the monitor.

pub mod error;
pub mod exporter;
pub mod mapping;
pub mod metrics_exporter;
pub mod producer;
pub mod schema;

pub use error::{ExportError, ExportResult};
pub use exporter::{BoxFuture, DynExporter, Exporter, TopicExporter, Topics};
pub use mapping::{
    make_config_set_mapping, make_config_set_simplified_mapping, make_transmission_mapping,
    ConfigSetRecord, ConfigSetSimplifiedRecord, TransmissionRecord,
};
pub use metrics_exporter::MetricsExporter;
pub use producer::{DynProducer, LogProducer, MockProducer, ProducedRecord, Producer};
pub use schema::{DynSchema, JsonSchema, Schema, Schemas};
