//! Inbound change events
//!
//! The tagged union produced by the change-capture boundary. The tag
//! is resolved once, here, when a raw record is converted; merge logic
//! never inspects runtime types.

use petclinic_indexer_types::{Owner, Pet, Visit};

/// One typed change record from the source database.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Owner(Owner),
    Pet(Pet),
    Visit(Visit),
}

impl ChangeEvent {
    /// Source table this event came from.
    pub fn table(&self) -> &'static str {
        match self {
            ChangeEvent::Owner(_) => "owners",
            ChangeEvent::Pet(_) => "pets",
            ChangeEvent::Visit(_) => "visits",
        }
    }

    /// Identity of the changed row.
    pub fn id(&self) -> i32 {
        match self {
            ChangeEvent::Owner(owner) => owner.id,
            ChangeEvent::Pet(pet) => pet.id,
            ChangeEvent::Visit(visit) => visit.id,
        }
    }
}
