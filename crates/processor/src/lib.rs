//! Stateful incremental join engine for the PetClinic indexer
//!
//! This crate denormalizes the owners/pets/visits schema into nested
//! owner documents, incrementally, as change events for each table
//! arrive out of order. The core is [`join::OneToManyJoin`], a keyed
//! operator that tolerates forward references, absorbs duplicate
//! deliveries, and never emits an unconfirmed placeholder. Two
//! instances of it, chained and re-keyed, form the
//! [`pipeline::IndexingPipeline`].

pub mod config;
pub mod enrich;
pub mod error;
pub mod event;
pub mod join;
pub mod kafka;
pub mod pipeline;
pub mod sink;

// Re-export commonly used types
pub use config::{ElasticSinkConfig, EnrichmentConfig, IndexerConfig, PipelineConfig, SourceConfig};
pub use enrich::{
    enrich_visit, ExtractError, KeywordExtractor, NoopExtractor, RakeExtractor, MAX_KEYWORDS,
};
pub use error::{ProcessorError, RecordError, Result, SinkError};
pub use event::ChangeEvent;
pub use join::{JoinChild, JoinEvent, JoinParent, KeyedStore, MemoryStore, OneToManyJoin};
pub use kafka::ChangeEventSource;
pub use pipeline::{IndexingPipeline, PipelineStats};
pub use sink::{DocumentSink, ElasticSink, MemorySink};
