//! Owner, Pet and Visit value snapshots
//!
//! Field names follow the PetClinic column names so the same structs
//! deserialize a change-capture row and serialize the sink document.
//! Scalar attributes are `Option` because a shell entity (synthesized
//! from a child's forward reference) carries only its identity.
//!
//! Embedded collections are sets keyed by child id with insertion order
//! preserved: attaching an already-present id replaces it in place,
//! attaching a new id appends.

use serde::{Deserialize, Serialize};

/// Owner of one or more pets. Root of the denormalized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

impl Owner {
    pub fn new(id: i32, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            pets: Vec::new(),
        }
    }

    /// Placeholder owner created from a pet's forward reference before
    /// any owner row has been seen. Never emitted downstream.
    pub fn shell(id: i32, first_pet: Pet) -> Self {
        Self {
            id,
            first_name: None,
            last_name: None,
            pets: vec![first_pet],
        }
    }

    /// Combine a newly arrived owner row with previously accumulated
    /// state. Incoming scalars win; pets already attached to `current`
    /// are preserved (owner rows never carry pets).
    pub fn merge(mut self, current: &Owner) -> Owner {
        if self.first_name.is_none() {
            self.first_name = current.first_name.clone();
        }
        if self.last_name.is_none() {
            self.last_name = current.last_name.clone();
        }
        self.pets = merge_by_id(self.pets, &current.pets, |p| p.id);
        self
    }

    /// New owner with `pet` inserted or replaced by id. All other
    /// fields unchanged.
    pub fn with_pet(mut self, pet: Pet) -> Owner {
        upsert_by_id(&mut self.pets, pet, |p| p.id);
        self
    }

    /// An owner is confirmed once a real owner row has been seen. The
    /// marker is `first_name`, which a shell never has.
    pub fn confirmed(&self) -> bool {
        self.first_name.is_some()
    }
}

/// A pet, embedding its visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: i32,
    pub owner_id: Option<i32>,
    pub name: Option<String>,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Pet {
    pub fn new(id: i32, name: impl Into<String>, owner_id: i32) -> Self {
        Self {
            id,
            owner_id: Some(owner_id),
            name: Some(name.into()),
            visits: Vec::new(),
        }
    }

    /// Placeholder pet created from a visit's forward reference.
    pub fn shell(id: i32, first_visit: Visit) -> Self {
        Self {
            id,
            owner_id: None,
            name: None,
            visits: vec![first_visit],
        }
    }

    /// Combine a newly arrived pet snapshot with accumulated state.
    /// Incoming scalars win; visits are the union of both snapshots,
    /// keyed by visit id with incoming taking precedence.
    pub fn merge(mut self, current: &Pet) -> Pet {
        if self.owner_id.is_none() {
            self.owner_id = current.owner_id;
        }
        if self.name.is_none() {
            self.name = current.name.clone();
        }
        self.visits = merge_by_id(self.visits, &current.visits, |v| v.id);
        self
    }

    /// New pet with `visit` inserted or replaced by id.
    pub fn with_visit(mut self, visit: Visit) -> Pet {
        upsert_by_id(&mut self.visits, visit, |v| v.id);
        self
    }

    /// A pet is confirmed once a real pet row has been seen; the row
    /// always carries the name and the owner foreign key.
    pub fn confirmed(&self) -> bool {
        self.name.is_some()
    }
}

/// A pet's visit to the vet. Leaf of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: i32,
    pub pet_id: i32,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Visit {
    pub fn new(id: i32, pet_id: i32, description: impl Into<String>) -> Self {
        Self {
            id,
            pet_id,
            description: Some(description.into()),
            keywords: Vec::new(),
        }
    }

    /// Combine a redelivered or updated visit row with stored state.
    /// Derived keywords survive a redelivery that lacks them, but only
    /// while the description is unchanged: keywords derived from an
    /// old description must not describe a new one.
    pub fn merge(mut self, current: &Visit) -> Visit {
        if self.description.is_none() {
            self.description = current.description.clone();
        }
        if self.keywords.is_empty() && self.description == current.description {
            self.keywords = current.keywords.clone();
        }
        self
    }
}

/// Insert `item` into `items`, replacing in place when an entry with
/// the same id exists, appending otherwise.
fn upsert_by_id<T, K: PartialEq>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> K) {
    match items.iter().position(|existing| id(existing) == id(&item)) {
        Some(pos) => items[pos] = item,
        None => items.push(item),
    }
}

/// Union of two child collections keyed by id. Entries from `incoming`
/// keep their positions and win on conflict; entries only present in
/// `current` are appended in their original order.
fn merge_by_id<T: Clone, K: PartialEq>(incoming: Vec<T>, current: &[T], id: impl Fn(&T) -> K) -> Vec<T> {
    let mut merged = incoming;
    for item in current {
        if !merged.iter().any(|existing| id(existing) == id(item)) {
            merged.push(item.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_merge_keeps_accumulated_pets() {
        let shell = Owner::shell(1, Pet::new(100, "Samantha", 1));
        let incoming = Owner::new(1, "Jean", "Coleman");

        let merged = incoming.merge(&shell);
        assert_eq!(merged.first_name.as_deref(), Some("Jean"));
        assert_eq!(merged.pets.len(), 1);
        assert!(merged.confirmed());
    }

    #[test]
    fn owner_shell_is_not_confirmed() {
        let shell = Owner::shell(2, Pet::new(200, "Max", 2));
        assert!(!shell.confirmed());
    }

    #[test]
    fn with_pet_replaces_by_id_in_place() {
        let owner = Owner::new(1, "Jean", "Coleman")
            .with_pet(Pet::new(100, "Samantha", 1))
            .with_pet(Pet::new(101, "Max", 1))
            .with_pet(Pet::new(100, "Sam", 1));

        assert_eq!(owner.pets.len(), 2);
        assert_eq!(owner.pets[0].id, 100);
        assert_eq!(owner.pets[0].name.as_deref(), Some("Sam"));
        assert_eq!(owner.pets[1].id, 101);
    }

    #[test]
    fn pet_merge_unions_visits() {
        let stored = Pet::shell(7, Visit::new(1, 7, "rabies shot"));
        let incoming = Pet::new(7, "Samantha", 6);

        let merged = incoming.merge(&stored);
        assert!(merged.confirmed());
        assert_eq!(merged.owner_id, Some(6));
        assert_eq!(merged.visits.len(), 1);
    }

    #[test]
    fn pet_merge_incoming_visit_wins_on_conflict() {
        let stored = Pet::new(7, "Samantha", 6).with_visit(Visit::new(1, 7, "rabies shot"));
        let incoming = Pet::new(7, "Samantha", 6).with_visit(Visit::new(1, 7, "booster"));

        let merged = incoming.merge(&stored);
        assert_eq!(merged.visits.len(), 1);
        assert_eq!(merged.visits[0].description.as_deref(), Some("booster"));
    }

    #[test]
    fn visit_merge_preserves_keywords() {
        let mut enriched = Visit::new(1, 7, "rabies shot");
        enriched.keywords = vec!["shot".to_string()];

        let redelivered = Visit::new(1, 7, "rabies shot");
        let merged = redelivered.merge(&enriched);
        assert_eq!(merged.keywords, vec!["shot".to_string()]);
    }

    #[test]
    fn visit_merge_drops_keywords_of_a_changed_description() {
        let mut enriched = Visit::new(1, 7, "rabies shot");
        enriched.keywords = vec!["rabies shot".to_string()];

        let updated = Visit::new(1, 7, "dental cleaning");
        let merged = updated.merge(&enriched);
        assert_eq!(merged.description.as_deref(), Some("dental cleaning"));
        assert!(merged.keywords.is_empty());
    }

    #[test]
    fn visit_merge_without_description_inherits_both() {
        let mut enriched = Visit::new(1, 7, "rabies shot");
        enriched.keywords = vec!["rabies shot".to_string()];

        let mut bare = Visit::new(1, 7, "x");
        bare.description = None;
        let merged = bare.merge(&enriched);
        assert_eq!(merged.description.as_deref(), Some("rabies shot"));
        assert_eq!(merged.keywords, vec!["rabies shot".to_string()]);
    }

    #[test]
    fn owner_document_shape() {
        let owner = Owner::new(1, "Jean", "Coleman")
            .with_pet(Pet::new(100, "Samantha", 1).with_visit(Visit::new(5, 100, "checkup")));

        let json = serde_json::to_value(&owner).unwrap();
        assert_eq!(json["first_name"], "Jean");
        assert_eq!(json["pets"][0]["name"], "Samantha");
        assert_eq!(json["pets"][0]["visits"][0]["description"], "checkup");
    }

    #[test]
    fn owner_row_without_pets_deserializes() {
        let owner: Owner =
            serde_json::from_str(r#"{"id":6,"first_name":"Jean","last_name":"Coleman"}"#).unwrap();
        assert_eq!(owner.id, 6);
        assert!(owner.pets.is_empty());
    }
}
