//! The one-to-many join operator
//!
//! `OneToManyJoin` maintains per-key state for one partition and one
//! hierarchy level. It tolerates forward references (a child arriving
//! before its parent), merges duplicate updates idempotently, and
//! never hands a shell parent to downstream consumers.
//!
//! Per-key lifecycle: UNSEEN, then SHELL once a forward-referencing
//! child creates a placeholder, then CONFIRMED once a real parent
//! event arrives. CONFIRMED is permanent; only SHELL suppresses
//! emission.

use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

use super::store::{KeyedStore, MemoryStore};

/// A child entity in a one-to-many relationship
pub trait JoinChild: Clone + Send + 'static {
    type Key: Eq + Hash + Clone + Debug + Send + 'static;

    /// The child's own identity.
    fn key(&self) -> Self::Key;

    /// Combine a newly arrived snapshot with previously accumulated
    /// state for the same key. Must preserve any nested grandchildren
    /// already attached to `current`.
    fn merge(self, current: &Self) -> Self;
}

/// A parent entity owning a collection of children keyed by child id
pub trait JoinParent: Clone + Send + 'static {
    type Key: Eq + Hash + Clone + Debug + Send + 'static;
    type Child: JoinChild<Key = Self::Key>;

    /// The parent's own identity.
    fn key(&self) -> Self::Key;

    /// Combine a newly arrived snapshot with previously accumulated
    /// state. Must preserve any children already attached to `current`.
    fn merge(self, current: &Self) -> Self;

    /// New parent with `child` inserted or replaced by id; all other
    /// fields unchanged.
    fn attach(self, child: Self::Child) -> Self;

    /// Placeholder parent holding only its identity and `first_child`,
    /// created when a child forward-references an unseen parent.
    fn shell(key: Self::Key, first_child: Self::Child) -> Self;

    /// Whether a real parent event has populated this value. Shells
    /// are never confirmed.
    fn confirmed(&self) -> bool;
}

/// One input event for the join, already routed by the parent's key.
///
/// The tag is resolved once at the ingestion boundary; merge logic
/// only ever sees this sum type.
#[derive(Debug, Clone)]
pub enum JoinEvent<P: JoinParent> {
    /// A direct change to the parent entity.
    Parent(P),
    /// A change to a child entity, carrying the foreign key that
    /// routed it here.
    Child {
        parent_key: P::Key,
        child: P::Child,
    },
}

impl<P: JoinParent> JoinEvent<P> {
    /// Deterministic partition key: the parent's identity for parent
    /// events, the foreign key for child events. The router must apply
    /// this same function consistently across restarts for state to
    /// remain addressable.
    pub fn partition_key(&self) -> P::Key {
        match self {
            JoinEvent::Parent(parent) => parent.key(),
            JoinEvent::Child { parent_key, .. } => parent_key.clone(),
        }
    }
}

/// Stateful incremental one-to-many join for a single partition.
///
/// All work is synchronous in-memory lookup and value construction;
/// the operator performs no I/O and has no error path for typed input.
pub struct OneToManyJoin<P: JoinParent> {
    parents: Box<dyn KeyedStore<P::Key, P>>,
    children: Box<dyn KeyedStore<P::Key, P::Child>>,
}

impl<P: JoinParent> OneToManyJoin<P> {
    /// New operator with in-memory state.
    pub fn new() -> Self {
        Self {
            parents: Box::new(MemoryStore::new()),
            children: Box::new(MemoryStore::new()),
        }
    }

    /// New operator with caller-supplied stores.
    pub fn with_stores(
        parents: Box<dyn KeyedStore<P::Key, P>>,
        children: Box<dyn KeyedStore<P::Key, P::Child>>,
    ) -> Self {
        Self { parents, children }
    }

    /// Process one event, returning the latest fully merged parent if
    /// it is eligible for emission.
    ///
    /// A parent event always emits: it is either the first sighting or
    /// the first confirmation of a shell, and in both cases downstream
    /// must see the refreshed snapshot. A child event emits only when
    /// the owning parent is already confirmed.
    pub fn process(&mut self, event: JoinEvent<P>) -> Option<P> {
        match event {
            JoinEvent::Parent(incoming) => {
                let key = incoming.key();
                let merged = match self.parents.get(&key) {
                    Some(current) => incoming.merge(current),
                    None => incoming,
                };
                self.parents.insert(key, merged.clone());
                Some(merged)
            }
            JoinEvent::Child { parent_key, child } => {
                let child_key = child.key();
                let merged_child = match self.children.get(&child_key) {
                    Some(current) => child.merge(current),
                    None => child,
                };
                self.children.insert(child_key, merged_child.clone());

                // Always persist the updated parent back into its own
                // store before it is forwarded, so a later child event
                // starts from the full accumulated state.
                let updated = match self.parents.get(&parent_key) {
                    Some(current) => current.clone().attach(merged_child),
                    None => P::shell(parent_key.clone(), merged_child),
                };
                self.parents.insert(parent_key.clone(), updated.clone());

                if updated.confirmed() {
                    Some(updated)
                } else {
                    trace!(?parent_key, "suppressing unconfirmed parent");
                    None
                }
            }
        }
    }

    /// Number of distinct parent keys held.
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Number of distinct child keys held.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

impl<P: JoinParent> Default for OneToManyJoin<P> {
    fn default() -> Self {
        Self::new()
    }
}
