//! Join trait implementations for the PetClinic model
//!
//! Level 1 joins visits into pets; level 2 joins the resulting pets
//! into owners. A `Pet` therefore plays both roles: parent of visits,
//! child of an owner.

use petclinic_indexer_types::{Owner, Pet, Visit};

use super::operator::{JoinChild, JoinParent};

impl JoinChild for Visit {
    type Key = i32;

    fn key(&self) -> i32 {
        self.id
    }

    fn merge(self, current: &Visit) -> Visit {
        Visit::merge(self, current)
    }
}

impl JoinParent for Pet {
    type Key = i32;
    type Child = Visit;

    fn key(&self) -> i32 {
        self.id
    }

    fn merge(self, current: &Pet) -> Pet {
        Pet::merge(self, current)
    }

    fn attach(self, child: Visit) -> Pet {
        self.with_visit(child)
    }

    fn shell(key: i32, first_child: Visit) -> Pet {
        Pet::shell(key, first_child)
    }

    fn confirmed(&self) -> bool {
        Pet::confirmed(self)
    }
}

impl JoinChild for Pet {
    type Key = i32;

    fn key(&self) -> i32 {
        self.id
    }

    fn merge(self, current: &Pet) -> Pet {
        Pet::merge(self, current)
    }
}

impl JoinParent for Owner {
    type Key = i32;
    type Child = Pet;

    fn key(&self) -> i32 {
        self.id
    }

    fn merge(self, current: &Owner) -> Owner {
        Owner::merge(self, current)
    }

    fn attach(self, child: Pet) -> Owner {
        self.with_pet(child)
    }

    fn shell(key: i32, first_child: Pet) -> Owner {
        Owner::shell(key, first_child)
    }

    fn confirmed(&self) -> bool {
        Owner::confirmed(self)
    }
}
