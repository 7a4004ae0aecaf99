//! Stateful one-to-many join
//!
//! The keyed operator at the heart of the indexer: it consumes a mixed
//! stream of parent and child change events routed by the parent's key
//! and emits the latest fully merged parent whenever the parent has
//! been confirmed by a real parent event.

pub mod impls;
pub mod operator;
pub mod store;

pub use operator::{JoinChild, JoinEvent, JoinParent, OneToManyJoin};
pub use store::{KeyedStore, MemoryStore};
