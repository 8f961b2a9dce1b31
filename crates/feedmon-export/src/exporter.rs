//! Exporter trait and the topic exporter.

use crate::error::{ExportError, ExportResult};
use crate::mapping::{
    make_config_set_mapping, make_config_set_simplified_mapping, make_transmission_mapping,
};
use crate::producer::DynProducer;
use crate::schema::{Schema, Schemas};
use feedmon_core::{ChainConfig, Envelope, FeedConfig};
use feedmon_telemetry::DynMetrics;
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{error, trace};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Consumes envelopes for one feed.
///
/// Failures are handled (logged) inside the exporter; nothing propagates to
/// the calling monitor.
pub trait Exporter: Send + Sync {
    fn export<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, ()>;

    /// Release per-feed resources. Called once when the monitor stops.
    fn cleanup(&self) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for Exporter trait objects.
pub type DynExporter = Arc<dyn Exporter>;

/// Destination topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub config_set: String,
    pub config_set_simplified: String,
    pub transmission: String,
}

/// Maps, encodes and publishes records for one feed.
pub struct TopicExporter {
    chain: ChainConfig,
    feed: FeedConfig,
    producer: DynProducer,
    schemas: Schemas,
    topics: Topics,
    metrics: DynMetrics,
}

impl TopicExporter {
    pub fn new(
        chain: ChainConfig,
        feed: FeedConfig,
        producer: DynProducer,
        schemas: Schemas,
        topics: Topics,
        metrics: DynMetrics,
    ) -> Self {
        Self {
            chain,
            feed,
            producer,
            schemas,
            topics,
            metrics,
        }
    }

    /// Run one map, encode, publish pipeline. Errors end this pipeline only.
    async fn pipeline<R: Serialize>(
        &self,
        mapped: ExportResult<R>,
        schema: &dyn Schema,
        topic: &str,
    ) {
        let result = self.try_pipeline(mapped, schema, topic).await;
        self.metrics.export_outcome(topic, result.is_ok());
    }

    async fn try_pipeline<R: Serialize>(
        &self,
        mapped: ExportResult<R>,
        schema: &dyn Schema,
        topic: &str,
    ) -> ExportResult<()> {
        let record = schema.name();
        let feed = self.feed.feed_name.as_str();

        let payload = mapped
            .and_then(|r| serde_json::to_value(r).map_err(|e| ExportError::Mapping(e.to_string())))
            .map_err(|e| {
                error!(feed, record, error = %e, "Failed to map record");
                e
            })?;

        let encoded = schema.encode(&payload).map_err(|e| {
            error!(feed, record, payload = %payload, error = %e, "Failed to encode record");
            e
        })?;

        let key = self.feed.state_account.as_bytes();
        self.producer
            .produce(key, encoded, topic)
            .await
            .map_err(|e| {
                error!(feed, record, topic, payload = %payload, error = %e, "Failed to publish record");
                e
            })?;

        trace!(feed, record, topic, "Exported record");
        Ok(())
    }
}

impl Exporter for TopicExporter {
    fn export<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match envelope {
                Envelope::State(env) => {
                    self.pipeline(
                        make_config_set_mapping(env, &self.chain, &self.feed),
                        self.schemas.config_set.as_ref(),
                        &self.topics.config_set,
                    )
                    .await;
                    self.pipeline(
                        make_config_set_simplified_mapping(env, &self.feed),
                        self.schemas.config_set_simplified.as_ref(),
                        &self.topics.config_set_simplified,
                    )
                    .await;
                }
                Envelope::Transmission(env) => {
                    self.pipeline(
                        make_transmission_mapping(env, &self.chain, &self.feed),
                        self.schemas.transmission.as_ref(),
                        &self.topics.transmission,
                    )
                    .await;
                }
            }
        })
    }

    fn cleanup(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            trace!(feed = %self.feed.feed_name, "Topic exporter cleaned up");
        })
    }
}
