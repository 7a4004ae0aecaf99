//! Document sink boundary
//!
//! Every emission from the top-level join is the authoritative latest
//! snapshot of one owner document. Sinks upsert it keyed by owner id:
//! insert if absent, otherwise fully replace, embedded children
//! included. A failed write is the sink's to retry; it never rolls
//! back or repeats the join computation.

pub mod elastic;
pub mod memory;

use async_trait::async_trait;
use petclinic_indexer_types::Owner;

use crate::error::SinkError;

/// Upsert target for emitted owner documents.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn upsert(&self, owner: &Owner) -> Result<(), SinkError>;
}

pub use elastic::{ElasticSink, SinkMetrics};
pub use memory::MemorySink;
