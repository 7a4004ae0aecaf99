//! Configuration for the indexer pipeline
//!
//! Serde structures covering the change-capture source, the document
//! sink and the in-process pipeline. Every struct validates itself;
//! the composite `IndexerConfig::validate` is what the CLI calls after
//! merging file and flag values.

use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Top-level indexer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexerConfig {
    /// Change-capture source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Document sink configuration
    #[serde(default)]
    pub sink: ElasticSinkConfig,

    /// Pipeline execution configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Enrichment configuration
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl IndexerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.sink.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

/// Configuration for the Kafka change-capture source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,

    /// Consumer group ID
    pub group_id: String,

    /// Topic carrying owner change records
    #[serde(default = "default_owners_topic")]
    pub owners_topic: String,

    /// Topic carrying pet change records
    #[serde(default = "default_pets_topic")]
    pub pets_topic: String,

    /// Topic carrying visit change records
    #[serde(default = "default_visits_topic")]
    pub visits_topic: String,

    /// Offset reset behavior for a new consumer group
    #[serde(default = "default_offset_reset")]
    pub auto_offset_reset: String,

    /// When consumed offsets are committed back to Kafka
    #[serde(default)]
    pub commit_strategy: CommitStrategy,

    /// Commit interval for the periodic strategy (seconds)
    #[serde(default = "default_commit_interval_secs")]
    pub commit_interval_secs: u64,

    /// Additional Kafka consumer configuration
    #[serde(default)]
    pub extra_config: HashMap<String, String>,
}

/// Offset commit strategy. Auto-commit is deliberately not offered:
/// offsets are only committed after a record has been handed to the
/// pipeline, keeping delivery at-least-once across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommitStrategy {
    /// Commit after every handled record
    Manual,
    /// Commit on a fixed interval
    #[default]
    Periodic,
}

fn default_owners_topic() -> String {
    "petclinic.petclinic.owners".to_string()
}
fn default_pets_topic() -> String {
    "petclinic.petclinic.pets".to_string()
}
fn default_visits_topic() -> String {
    "petclinic.petclinic.visits".to_string()
}
fn default_offset_reset() -> String {
    "earliest".to_string()
}
fn default_commit_interval_secs() -> u64 {
    5
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "petclinic-indexer".to_string(),
            owners_topic: default_owners_topic(),
            pets_topic: default_pets_topic(),
            visits_topic: default_visits_topic(),
            auto_offset_reset: default_offset_reset(),
            commit_strategy: CommitStrategy::default(),
            commit_interval_secs: default_commit_interval_secs(),
            extra_config: HashMap::new(),
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.brokers.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "source brokers cannot be empty".into(),
            });
        }
        if self.group_id.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "source group_id cannot be empty".into(),
            });
        }
        let topics = [&self.owners_topic, &self.pets_topic, &self.visits_topic];
        if topics.iter().any(|t| t.is_empty()) {
            return Err(ProcessorError::Configuration {
                source: "source topics cannot be empty".into(),
            });
        }
        if self.commit_interval_secs == 0 {
            return Err(ProcessorError::Configuration {
                source: "commit_interval_secs must be greater than 0".into(),
            });
        }
        Ok(())
    }

    /// All subscribed topics in a stable order
    pub fn topics(&self) -> Vec<&str> {
        vec![&self.owners_topic, &self.pets_topic, &self.visits_topic]
    }
}

/// Configuration for the Elasticsearch document sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticSinkConfig {
    /// Base URL of the Elasticsearch node
    pub url: String,

    /// Target index name
    pub index: String,

    /// Maximum retries for a failed upsert
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Request timeout (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    100
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ElasticSinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "owners".to_string(),
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ElasticSinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "sink url cannot be empty".into(),
            });
        }
        if self.index.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "sink index cannot be empty".into(),
            });
        }
        Ok(())
    }
}

/// Configuration for the in-process pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of join workers per hierarchy level
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Events to buffer per worker channel before backpressure
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_parallelism() -> usize {
    4
}
fn default_buffer_size() -> usize {
    1024
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(ProcessorError::Configuration {
                source: "parallelism must be greater than 0".into(),
            });
        }
        if self.buffer_size == 0 {
            return Err(ProcessorError::Configuration {
                source: "buffer_size must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

/// Configuration for visit enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Whether keyword enrichment is applied at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
