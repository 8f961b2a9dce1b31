//! Application configuration.
//!
//! Loaded from a TOML file with an environment overlay: every key can be
//! overridden with `FEEDMON__<SECTION>__<KEY>`, e.g.
//! `FEEDMON__SOLANA__RPC_ENDPOINT`.

use crate::error::{AppError, AppResult};
use feedmon_core::{ChainConfig, FeedConfig};
use feedmon_export::Topics;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Broker settings and destination topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaConfig {
    #[serde(default)]
    pub brokers: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub security_protocol: String,
    #[serde(default)]
    pub sasl_mechanism: String,
    #[serde(default)]
    pub sasl_username: String,
    #[serde(default)]
    pub sasl_password: String,

    #[serde(default)]
    pub transmission_topic: String,
    #[serde(default)]
    pub config_set_topic: String,
    #[serde(default)]
    pub config_set_simplified_topic: String,
}

impl KafkaConfig {
    pub fn topics(&self) -> Topics {
        Topics {
            config_set: self.config_set_topic.clone(),
            config_set_simplified: self.config_set_simplified_topic.clone(),
            transmission: self.transmission_topic.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistryConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Feed discovery.
///
/// Precedence: fake directory (feature flag), then `url`, then `file_path`,
/// then the static `feeds` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub file_path: Option<String>,
    /// Reference data directory URL. Overrides `file_path` when set.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_rdd_read_timeout_ms")]
    pub rdd_read_timeout_ms: u64,
    #[serde(default = "default_rdd_poll_interval_ms")]
    pub rdd_poll_interval_ms: u64,
    #[serde(default)]
    pub rdd_buffer_depth: usize,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

fn default_rdd_read_timeout_ms() -> u64 {
    1_000
}

fn default_rdd_poll_interval_ms() -> u64 {
    10_000
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            url: None,
            rdd_read_timeout_ms: default_rdd_read_timeout_ms(),
            rdd_poll_interval_ms: default_rdd_poll_interval_ms(),
            rdd_buffer_depth: 0,
            feeds: Vec::new(),
        }
    }
}

impl FeedsConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.rdd_read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.rdd_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address of the metrics and health server. Empty disables it.
    #[serde(default = "default_http_address")]
    pub address: String,
}

fn default_http_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Read random account state instead of a chain node.
    #[serde(default)]
    pub test_only_fake_readers: bool,
    /// Serve random feeds instead of the reference data directory.
    #[serde(default)]
    pub test_only_fake_rdd: bool,
    #[serde(default = "default_fake_rdd_feeds")]
    pub test_only_fake_rdd_feeds: usize,
    /// Recompute the config digest of every state read.
    #[serde(default)]
    pub verify_digest: bool,
}

fn default_fake_rdd_feeds() -> usize {
    10
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            test_only_fake_readers: false,
            test_only_fake_rdd: false,
            test_only_fake_rdd_feeds: default_fake_rdd_feeds(),
            verify_digest: false,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub solana: ChainConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub schema_registry: SchemaRegistryConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub feature: FeatureConfig,
}

impl AppConfig {
    /// Load from a TOML file, overlaid with `FEEDMON__*` environment variables.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("FEEDMON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Parse TOML without the environment overlay.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject configurations the service cannot start with.
    ///
    /// Chain readers are checked when the application builds its monitors,
    /// since they may be injected instead of configured.
    pub fn validate(&self) -> AppResult<()> {
        for (name, topic) in [
            ("kafka.transmission_topic", &self.kafka.transmission_topic),
            ("kafka.config_set_topic", &self.kafka.config_set_topic),
            (
                "kafka.config_set_simplified_topic",
                &self.kafka.config_set_simplified_topic,
            ),
        ] {
            if topic.trim().is_empty() {
                return Err(AppError::Config(format!("{name} must be set")));
            }
        }

        if self.solana.read_timeout_ms == 0 {
            return Err(AppError::Config(
                "solana.read_timeout_ms must be positive".to_string(),
            ));
        }
        if self.feeds.rdd_read_timeout_ms == 0 {
            return Err(AppError::Config(
                "feeds.rdd_read_timeout_ms must be positive".to_string(),
            ));
        }

        self.http_address()?;
        Ok(())
    }

    /// Parsed HTTP listen address, `None` when the server is disabled.
    pub fn http_address(&self) -> AppResult<Option<SocketAddr>> {
        let address = self.http.address.trim();
        if address.is_empty() {
            return Ok(None);
        }
        address
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("invalid http.address {address:?}: {e}")))
    }
}
