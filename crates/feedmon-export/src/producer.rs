//! Record publishing.

use crate::error::{ExportError, ExportResult};
use crate::exporter::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Publishes encoded records. One producer is shared by every exporter.
pub trait Producer: Send + Sync {
    fn produce<'a>(
        &'a self,
        key: &'a [u8],
        value: Vec<u8>,
        topic: &'a str,
    ) -> BoxFuture<'a, ExportResult<()>>;
}

/// Arc wrapper for Producer trait objects.
pub type DynProducer = Arc<dyn Producer>;

/// Dry-run producer that logs every record instead of publishing it.
#[derive(Debug, Default)]
pub struct LogProducer;

impl Producer for LogProducer {
    fn produce<'a>(
        &'a self,
        key: &'a [u8],
        value: Vec<u8>,
        topic: &'a str,
    ) -> BoxFuture<'a, ExportResult<()>> {
        Box::pin(async move {
            info!(topic, key = %hex::encode(key), bytes = value.len(), "Produced record");
            debug!(topic, payload = %String::from_utf8_lossy(&value), "Record payload");
            Ok(())
        })
    }
}

/// A record captured by `MockProducer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub topic: String,
}

impl ProducedRecord {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.value).unwrap_or(serde_json::Value::Null)
    }
}

/// Mock producer for testing.
#[derive(Debug, Default)]
pub struct MockProducer {
    records: Mutex<Vec<ProducedRecord>>,
    failing_topics: Mutex<HashSet<String>>,
}

impl MockProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every produce to `topic` fail.
    pub fn fail_topic(&self, topic: impl Into<String>) {
        self.failing_topics.lock().insert(topic.into());
    }

    pub fn records(&self) -> Vec<ProducedRecord> {
        self.records.lock().clone()
    }

    pub fn records_for(&self, topic: &str) -> Vec<ProducedRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.topic == topic)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Producer for MockProducer {
    fn produce<'a>(
        &'a self,
        key: &'a [u8],
        value: Vec<u8>,
        topic: &'a str,
    ) -> BoxFuture<'a, ExportResult<()>> {
        Box::pin(async move {
            if self.failing_topics.lock().contains(topic) {
                return Err(ExportError::Publish(format!("broker rejected {topic}")));
            }
            self.records.lock().push(ProducedRecord {
                key: key.to_vec(),
                value,
                topic: topic.to_string(),
            });
            Ok(())
        })
    }
}
