//! End-to-end behavior of the two-level join
//!
//! Drives the chained pet and owner joins with mixed change-event
//! sequences and checks the emitted documents: convergence independent
//! of arrival order, forward-reference handling, idempotence under
//! redelivery, and enrichment carried into the final document.

use std::sync::Arc;

use petclinic_indexer_processor::{
    enrich_visit, ChangeEvent, DocumentSink, EnrichmentConfig, ExtractError, IndexingPipeline,
    JoinEvent, KeywordExtractor, MemorySink, NoopExtractor, OneToManyJoin, PipelineConfig,
    RakeExtractor,
};
use petclinic_indexer_types::{Owner, Pet, Visit};
use tokio::sync::mpsc;

/// Synchronous mirror of the pipeline's stage graph, for tests that
/// need to observe every intermediate emission deterministically.
struct TwoLevelJoin {
    pets: OneToManyJoin<Pet>,
    owners: OneToManyJoin<Owner>,
}

impl TwoLevelJoin {
    fn new() -> Self {
        Self {
            pets: OneToManyJoin::new(),
            owners: OneToManyJoin::new(),
        }
    }

    fn apply(&mut self, event: ChangeEvent) -> Option<Owner> {
        match event {
            ChangeEvent::Owner(owner) => self.owners.process(JoinEvent::Parent(owner)),
            ChangeEvent::Pet(pet) => {
                let emitted = self.pets.process(JoinEvent::Parent(pet))?;
                self.forward(emitted)
            }
            ChangeEvent::Visit(visit) => {
                let emitted = self.pets.process(JoinEvent::Child {
                    parent_key: visit.pet_id,
                    child: visit,
                })?;
                self.forward(emitted)
            }
        }
    }

    fn forward(&mut self, pet: Pet) -> Option<Owner> {
        let owner_id = pet.owner_id.expect("confirmed pet carries owner_id");
        self.owners.process(JoinEvent::Child {
            parent_key: owner_id,
            child: pet,
        })
    }

    /// Final document after a sequence, ignoring suppressed steps.
    fn converge(events: Vec<ChangeEvent>) -> Option<Owner> {
        let mut join = Self::new();
        let mut last = None;
        for event in events {
            if let Some(owner) = join.apply(event) {
                last = Some(owner);
            }
        }
        last
    }
}

fn sample_events() -> Vec<ChangeEvent> {
    vec![
        ChangeEvent::Owner(Owner::new(6, "Jean", "Coleman")),
        ChangeEvent::Pet(Pet::new(7, "Samantha", 6)),
        ChangeEvent::Visit(Visit::new(1, 7, "rabies shot")),
        ChangeEvent::Visit(Visit::new(2, 7, "checkup")),
    ]
}

/// Children as an order-independent view for convergence comparison.
fn normalized(owner: &Owner) -> Vec<(i32, Vec<i32>)> {
    let mut pets: Vec<(i32, Vec<i32>)> = owner
        .pets
        .iter()
        .map(|pet| {
            let mut visits: Vec<i32> = pet.visits.iter().map(|v| v.id).collect();
            visits.sort_unstable();
            (pet.id, visits)
        })
        .collect();
    pets.sort_unstable();
    pets
}

fn permutations(events: Vec<ChangeEvent>) -> Vec<Vec<ChangeEvent>> {
    if events.len() <= 1 {
        return vec![events];
    }
    let mut out = Vec::new();
    for i in 0..events.len() {
        let mut rest = events.clone();
        let picked = rest.remove(i);
        for mut tail in permutations(rest) {
            let mut seq = vec![picked.clone()];
            seq.append(&mut tail);
            out.push(seq);
        }
    }
    out
}

#[test]
fn convergence_is_order_independent() {
    let reference = TwoLevelJoin::converge(sample_events()).unwrap();
    let expected = normalized(&reference);

    for sequence in permutations(sample_events()) {
        let converged = TwoLevelJoin::converge(sequence).unwrap();
        assert_eq!(normalized(&converged), expected);
        assert_eq!(converged.first_name.as_deref(), Some("Jean"));
    }
}

#[test]
fn redelivery_is_idempotent() {
    let mut once = TwoLevelJoin::new();
    let mut twice = TwoLevelJoin::new();

    let mut last_once = None;
    let mut last_twice = None;
    for event in sample_events() {
        last_once = once.apply(event.clone()).or(last_once);
        last_twice = twice.apply(event.clone()).or(last_twice);
        last_twice = twice.apply(event).or(last_twice);
    }

    let a = last_once.unwrap();
    let b = last_twice.unwrap();
    assert_eq!(normalized(&a), normalized(&b));
    assert_eq!(a.pets[0].visits.len(), b.pets[0].visits.len());
}

#[test]
fn jean_scenario() {
    let mut join = TwoLevelJoin::new();

    // Parent first: emits with an empty children collection
    let owner = join
        .apply(ChangeEvent::Owner(Owner::new(1, "Jean", "Coleman")))
        .unwrap();
    assert!(owner.pets.is_empty());

    // Child with the parent already seen: emitted with the child
    let owner = join.apply(ChangeEvent::Pet(Pet::new(100, "Samantha", 1))).unwrap();
    assert_eq!(owner.pets.len(), 1);
    assert_eq!(owner.pets[0].id, 100);

    // Same child id again: replaced in place, size stays 1
    let owner = join.apply(ChangeEvent::Pet(Pet::new(100, "Sam", 1))).unwrap();
    assert_eq!(owner.pets.len(), 1);
    assert_eq!(owner.pets[0].name.as_deref(), Some("Sam"));
}

#[test]
fn sam_scenario() {
    let mut join = TwoLevelJoin::new();

    // Child referencing an unseen parent: nothing emitted
    assert!(join.apply(ChangeEvent::Pet(Pet::new(200, "Rex", 2))).is_none());

    // The parent arrives later and emits with the accumulated child
    let owner = join
        .apply(ChangeEvent::Owner(Owner::new(2, "Sam", "Schultz")))
        .unwrap();
    assert_eq!(owner.first_name.as_deref(), Some("Sam"));
    assert_eq!(owner.pets.len(), 1);
    assert_eq!(owner.pets[0].id, 200);
}

#[test]
fn child_parent_child_keeps_both_in_arrival_order() {
    let mut join = TwoLevelJoin::new();
    join.apply(ChangeEvent::Pet(Pet::new(100, "Samantha", 1)));
    join.apply(ChangeEvent::Owner(Owner::new(1, "Jean", "Coleman")));
    let owner = join.apply(ChangeEvent::Pet(Pet::new(101, "Max", 1))).unwrap();

    assert_eq!(owner.pets.len(), 2);
    assert_eq!(owner.pets[0].id, 100);
    assert_eq!(owner.pets[1].id, 101);
}

#[test]
fn visit_before_pet_before_owner() {
    let mut join = TwoLevelJoin::new();

    assert!(join.apply(ChangeEvent::Visit(Visit::new(1, 7, "rabies shot"))).is_none());
    assert!(join.apply(ChangeEvent::Pet(Pet::new(7, "Samantha", 6))).is_none());

    let owner = join
        .apply(ChangeEvent::Owner(Owner::new(6, "Jean", "Coleman")))
        .unwrap();
    assert_eq!(owner.pets.len(), 1);
    assert_eq!(owner.pets[0].visits.len(), 1);
    assert_eq!(owner.pets[0].visits[0].description.as_deref(), Some("rabies shot"));
}

#[test]
fn second_visit_never_loses_the_first() {
    // The merged pet is persisted back into the pet store before it is
    // forwarded upward, so the union survives a second leaf event.
    let mut join = TwoLevelJoin::new();
    join.apply(ChangeEvent::Owner(Owner::new(6, "Jean", "Coleman")));
    join.apply(ChangeEvent::Pet(Pet::new(7, "Samantha", 6)));
    join.apply(ChangeEvent::Visit(Visit::new(1, 7, "rabies shot")));
    let owner = join.apply(ChangeEvent::Visit(Visit::new(2, 7, "checkup"))).unwrap();

    let visits = &owner.pets[0].visits;
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0].id, 1);
    assert_eq!(visits[1].id, 2);
}

struct SplitExtractor;

impl KeywordExtractor for SplitExtractor {
    fn keywords(&self, text: &str) -> Result<Vec<String>, ExtractError> {
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

#[test]
fn enrichment_reaches_the_final_document() {
    let mut join = TwoLevelJoin::new();
    join.apply(ChangeEvent::Owner(Owner::new(6, "Jean", "Coleman")));
    join.apply(ChangeEvent::Pet(Pet::new(7, "Samantha", 6)));

    let visit = enrich_visit(&SplitExtractor, Visit::new(1, 7, "rabies shot"));
    let owner = join.apply(ChangeEvent::Visit(visit)).unwrap();

    let keywords = &owner.pets[0].visits[0].keywords;
    assert_eq!(keywords, &vec!["rabies".to_string(), "shot".to_string()]);
}

#[tokio::test]
async fn async_pipeline_matches_synchronous_semantics() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = IndexingPipeline::new(
        PipelineConfig {
            parallelism: 2,
            buffer_size: 16,
        },
        EnrichmentConfig::default(),
        Arc::new(NoopExtractor),
        Arc::clone(&sink) as Arc<dyn DocumentSink>,
    );

    let (tx, rx) = mpsc::channel(64);
    for event in sample_events() {
        tx.send(event).await.unwrap();
    }
    // A second, unrelated owner on another partition
    tx.send(ChangeEvent::Owner(Owner::new(2, "Sam", "Schultz")))
        .await
        .unwrap();
    drop(tx);
    pipeline.run(rx).await.unwrap();

    let jean = sink.document(6).unwrap();
    assert_eq!(normalized(&jean), vec![(7, vec![1, 2])]);

    let sam = sink.document(2).unwrap();
    assert!(sam.pets.is_empty());
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn rake_keywords_reach_the_sinked_document() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = IndexingPipeline::new(
        PipelineConfig::default(),
        EnrichmentConfig { enabled: true },
        Arc::new(RakeExtractor::new()),
        Arc::clone(&sink) as Arc<dyn DocumentSink>,
    );

    let (tx, rx) = mpsc::channel(8);
    tx.send(ChangeEvent::Owner(Owner::new(6, "Jean", "Coleman")))
        .await
        .unwrap();
    tx.send(ChangeEvent::Pet(Pet::new(7, "Samantha", 6)))
        .await
        .unwrap();
    tx.send(ChangeEvent::Visit(Visit::new(1, 7, "rabies booster for the dog")))
        .await
        .unwrap();
    drop(tx);
    pipeline.run(rx).await.unwrap();

    let keywords = &sink.document(6).unwrap().pets[0].visits[0].keywords;
    assert_eq!(keywords, &vec!["rabies booster".to_string(), "dog".to_string()]);
}

#[tokio::test]
async fn async_pipeline_suppresses_unconfirmed_owners() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = IndexingPipeline::new(
        PipelineConfig::default(),
        EnrichmentConfig::default(),
        Arc::new(NoopExtractor),
        Arc::clone(&sink) as Arc<dyn DocumentSink>,
    );

    let (tx, rx) = mpsc::channel(8);
    tx.send(ChangeEvent::Visit(Visit::new(1, 7, "rabies shot")))
        .await
        .unwrap();
    tx.send(ChangeEvent::Pet(Pet::new(7, "Samantha", 6)))
        .await
        .unwrap();
    drop(tx);
    pipeline.run(rx).await.unwrap();

    assert!(sink.is_empty());
}
