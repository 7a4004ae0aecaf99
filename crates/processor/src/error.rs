//! Error types for the indexer pipeline
//!
//! The error taxonomy follows the boundary contracts: malformed input
//! records are rejected before they reach the join operator, an event
//! from an unrecognized table is a fatal contract violation, and sink
//! failures stay the sink's responsibility. The join operator itself
//! has no error path: typed input in, optional emission out.

use thiserror::Error;

/// Top-level pipeline error
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Malformed or unroutable input record
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Document sink errors
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Kafka consumer errors
    #[error("kafka error: {source}")]
    Kafka {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A pipeline stage terminated unexpectedly
    #[error("pipeline stage '{stage}' terminated: {reason}")]
    StageTerminated { stage: String, reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while converting a raw change record into a typed event
#[derive(Error, Debug)]
pub enum RecordError {
    /// The row is missing its identity column. Logged and dropped at
    /// the boundary, never enters operator state.
    #[error("record from table '{table}' is missing its id")]
    MissingId { table: String },

    /// The row is missing the foreign key to its parent.
    #[error("record {id} from table '{table}' is missing its foreign key")]
    MissingForeignKey { table: String, id: i32 },

    /// A message arrived from a table outside the routed set. This is
    /// a contract violation between router and operator and aborts the
    /// partition rather than being silently dropped.
    #[error("unknown table '{table}'")]
    UnknownTable { table: String },

    /// The change envelope could not be decoded.
    #[error("malformed change envelope: {reason}")]
    Envelope { reason: String },
}

impl RecordError {
    /// Whether this record error must abort the pipeline instead of
    /// dropping the single record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::UnknownTable { .. })
    }
}

/// Document sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink rejected the document after exhausting its retries.
    #[error("upsert of document {id} failed after {attempts} attempts: {reason}")]
    UpsertFailed {
        id: i32,
        attempts: u32,
        reason: String,
    },

    /// Transport-level failure talking to the document store.
    #[error("sink transport error: {0}")]
    Transport(String),

    /// The sink returned a non-success status.
    #[error("sink returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for ProcessorError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        ProcessorError::Kafka {
            source: Box::new(err),
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Transport(err.to_string())
    }
}
