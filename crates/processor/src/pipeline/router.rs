//! In-process partition routing
//!
//! Dispatches join events over worker channels by hashing the
//! deterministic partition key. All events sharing a key land on one
//! worker, in arrival order; distinct keys spread across the pool.
//! The key-extraction function lives on the event itself
//! ([`JoinEvent::partition_key`]) and must stay stable across
//! restarts.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc;

use crate::error::{ProcessorError, Result};
use crate::join::{JoinEvent, JoinParent};

/// Worker index for `key` in a pool of `workers`.
pub fn worker_index<K: Hash>(key: &K, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

/// Hash router over one level's worker channels.
pub struct Router<P: JoinParent> {
    senders: Vec<mpsc::Sender<JoinEvent<P>>>,
}

impl<P: JoinParent> Router<P> {
    pub fn new(senders: Vec<mpsc::Sender<JoinEvent<P>>>) -> Self {
        debug_assert!(!senders.is_empty());
        Self { senders }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Route `event` to the worker owning its partition key. Fails
    /// only when the target worker has terminated, which aborts the
    /// pipeline rather than silently dropping the event.
    pub async fn dispatch(&self, event: JoinEvent<P>) -> Result<()> {
        let index = worker_index(&event.partition_key(), self.senders.len());
        self.senders[index]
            .send(event)
            .await
            .map_err(|_| ProcessorError::StageTerminated {
                stage: format!("join-worker-{index}"),
                reason: "worker channel closed".to_string(),
            })
    }
}

impl<P: JoinParent> Clone for Router<P> {
    fn clone(&self) -> Self {
        Self {
            senders: self.senders.clone(),
        }
    }
}
