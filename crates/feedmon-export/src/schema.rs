//! Record encoding.

use crate::error::{ExportError, ExportResult};
use serde_json::Value;
use std::sync::Arc;

/// Encodes a mapped record into the bytes published to a topic.
pub trait Schema: Send + Sync {
    fn name(&self) -> &str;

    fn encode(&self, record: &Value) -> ExportResult<Vec<u8>>;
}

/// Arc wrapper for Schema trait objects.
pub type DynSchema = Arc<dyn Schema>;

/// JSON encoding with a required top-level field check.
#[derive(Debug, Clone)]
pub struct JsonSchema {
    name: String,
    required: Vec<String>,
}

impl JsonSchema {
    pub fn new<I, S>(name: impl Into<String>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    pub fn config_set() -> Self {
        Self::new(
            "config_set",
            [
                "block_number",
                "contract_config",
                "solana_program_id",
                "solana_chain_config",
                "state",
                "feed_config",
            ],
        )
    }

    pub fn config_set_simplified() -> Self {
        Self::new(
            "config_set_simplified",
            [
                "config_digest",
                "block_number",
                "signers",
                "transmitters",
                "billing",
                "feed_state_account",
            ],
        )
    }

    pub fn transmission() -> Self {
        Self::new(
            "transmission",
            ["block_number", "answer", "solana_chain_config", "feed_config"],
        )
    }
}

impl Schema for JsonSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, record: &Value) -> ExportResult<Vec<u8>> {
        let object = record.as_object().ok_or_else(|| {
            ExportError::Encoding(format!("{}: record is not an object", self.name))
        })?;
        if let Some(missing) = self.required.iter().find(|f| !object.contains_key(*f)) {
            return Err(ExportError::Encoding(format!(
                "{}: missing required field {missing:?}",
                self.name
            )));
        }
        serde_json::to_vec(record).map_err(|e| ExportError::Encoding(format!("{}: {e}", self.name)))
    }
}

/// The three schemas used by a topic exporter.
#[derive(Clone)]
pub struct Schemas {
    pub config_set: DynSchema,
    pub config_set_simplified: DynSchema,
    pub transmission: DynSchema,
}

impl Default for Schemas {
    fn default() -> Self {
        Self {
            config_set: Arc::new(JsonSchema::config_set()),
            config_set_simplified: Arc::new(JsonSchema::config_set_simplified()),
            transmission: Arc::new(JsonSchema::transmission()),
        }
    }
}
