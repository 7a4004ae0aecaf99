//! Keyed state store
//!
//! Join state sits behind this trait so a production deployment can
//! swap the in-memory map for a compacting or bounded store without
//! touching the merge algorithm. The default `MemoryStore` is a plain
//! `HashMap`: the partition router guarantees a store is owned by
//! exactly one worker, so no locking is needed and no operation
//! blocks.
//!
//! Entries are retained for the lifetime of the operator. Any key may
//! still receive a later event, so there is no eviction here; bounding
//! the keyspace is the caller's concern.

use std::collections::HashMap;
use std::hash::Hash;

/// Exclusive-owner keyed store for join state
pub trait KeyedStore<K, V>: Send {
    /// Look up the current value for `key`.
    fn get(&self, key: &K) -> Option<&V>;

    /// Store `value` under `key`, replacing any previous entry. There
    /// is never more than one entry per distinct key.
    fn insert(&mut self, key: K, value: V);

    /// Number of distinct keys ever stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory keyed store backing a single join worker
#[derive(Debug, Default)]
pub struct MemoryStore<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> KeyedStore<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Send,
    V: Send,
{
    fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
