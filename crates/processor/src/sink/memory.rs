//! In-memory document sink for tests

use async_trait::async_trait;
use dashmap::DashMap;
use petclinic_indexer_types::Owner;

use crate::error::SinkError;

use super::DocumentSink;

/// Upsert map keyed by owner id, holding the latest document.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: DashMap<i32, Owner>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Latest document for `id`, if any emission reached the sink.
    pub fn document(&self, id: i32) -> Option<Owner> {
        self.documents.get(&id).map(|entry| entry.clone())
    }

    /// Number of distinct documents upserted.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn upsert(&self, owner: &Owner) -> Result<(), SinkError> {
        // Full replace: the emission is the authoritative snapshot
        self.documents.insert(owner.id, owner.clone());
        Ok(())
    }
}
