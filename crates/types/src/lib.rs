//! Data model for the PetClinic indexer
//!
//! This crate holds the denormalized document model: an `Owner` embeds
//! its `Pet`s, and a `Pet` embeds its `Visit`s. Values are immutable
//! snapshots; every merge or attach constructs a new value.

pub mod model;

pub use model::{Owner, Pet, Visit};
