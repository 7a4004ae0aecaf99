//! The indexing pipeline
//!
//! Stage graph, mirroring the source schema:
//!
//! ```text
//! changes ──┬─ owners ──────────────────────────┐
//!           ├─ pets ────────┐                   ▼
//!           └─ visits ── enrich ──▶ join(pet) ──▶ join(owner) ──▶ sink
//! ```
//!
//! Both join levels run `parallelism` worker tasks. A worker owns its
//! join state exclusively and suspends only on channel I/O, so the
//! merge path itself never blocks. The pipeline runs until the input
//! channel closes, then drains every stage before returning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use petclinic_indexer_types::{Owner, Pet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{EnrichmentConfig, PipelineConfig};
use crate::enrich::{enrich_visit, KeywordExtractor};
use crate::error::{ProcessorError, Result};
use crate::event::ChangeEvent;
use crate::join::{JoinEvent, OneToManyJoin};
use crate::sink::DocumentSink;

use super::router::Router;

/// Counters shared between the pipeline stages.
#[derive(Debug, Default)]
pub struct PipelineStats {
    events_processed: AtomicU64,
    documents_emitted: AtomicU64,
    sink_failures: AtomicU64,
}

impl PipelineStats {
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn documents_emitted(&self) -> u64 {
        self.documents_emitted.load(Ordering::Relaxed)
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }
}

/// Two-level join pipeline from typed change events to sink upserts.
pub struct IndexingPipeline {
    config: PipelineConfig,
    enrichment: EnrichmentConfig,
    extractor: Arc<dyn KeywordExtractor>,
    sink: Arc<dyn DocumentSink>,
    stats: Arc<PipelineStats>,
}

impl IndexingPipeline {
    pub fn new(
        config: PipelineConfig,
        enrichment: EnrichmentConfig,
        extractor: Arc<dyn KeywordExtractor>,
        sink: Arc<dyn DocumentSink>,
    ) -> Self {
        Self {
            config,
            enrichment,
            extractor,
            sink,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// Shared stats handle; grab it before calling [`run`](Self::run).
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Consume change events until the channel closes, then drain all
    /// stages. Returns the first stage error, if any.
    pub async fn run(self, mut events: mpsc::Receiver<ChangeEvent>) -> Result<()> {
        let parallelism = self.config.parallelism;
        let buffer = self.config.buffer_size;
        info!(parallelism, buffer, "starting indexing pipeline");

        // Sink stage
        let (sink_tx, mut sink_rx) = mpsc::channel::<Owner>(buffer);
        let sink = Arc::clone(&self.sink);
        let sink_stats = Arc::clone(&self.stats);
        let sink_task: JoinHandle<Result<()>> = tokio::spawn(async move {
            while let Some(owner) = sink_rx.recv().await {
                if let Err(err) = sink.upsert(&owner).await {
                    // The emission stays correct; the document will be
                    // refreshed by the next event for this owner.
                    sink_stats.sink_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(id = owner.id, %err, "sink upsert failed");
                }
            }
            Ok(())
        });

        // Level 2: pets join into owners, keyed by owner id
        let mut owner_senders = Vec::with_capacity(parallelism);
        let mut owner_tasks: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(parallelism);
        for worker in 0..parallelism {
            let (tx, mut rx) = mpsc::channel::<JoinEvent<Owner>>(buffer);
            owner_senders.push(tx);
            let sink_tx = sink_tx.clone();
            let stats = Arc::clone(&self.stats);
            owner_tasks.push(tokio::spawn(async move {
                let mut join = OneToManyJoin::<Owner>::new();
                while let Some(event) = rx.recv().await {
                    if let Some(owner) = join.process(event) {
                        stats.documents_emitted.fetch_add(1, Ordering::Relaxed);
                        if sink_tx.send(owner).await.is_err() {
                            return Err(ProcessorError::StageTerminated {
                                stage: format!("owner-join-{worker}"),
                                reason: "sink channel closed".to_string(),
                            });
                        }
                    }
                }
                debug!(worker, parents = join.parent_count(), "owner join drained");
                Ok(())
            }));
        }
        drop(sink_tx);
        let owner_router: Router<Owner> = Router::new(owner_senders);

        // Level 1: visits join into pets, keyed by pet id
        let mut pet_senders = Vec::with_capacity(parallelism);
        let mut pet_tasks: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(parallelism);
        for worker in 0..parallelism {
            let (tx, mut rx) = mpsc::channel::<JoinEvent<Pet>>(buffer);
            pet_senders.push(tx);
            let router = owner_router.clone();
            pet_tasks.push(tokio::spawn(async move {
                let mut join = OneToManyJoin::<Pet>::new();
                while let Some(event) = rx.recv().await {
                    if let Some(pet) = join.process(event) {
                        // A confirmed pet always carries the owner
                        // foreign key; anything else is a contract
                        // violation and must abort, not be dropped.
                        let Some(owner_id) = pet.owner_id else {
                            error!(pet = pet.id, "confirmed pet without owner_id");
                            return Err(ProcessorError::StageTerminated {
                                stage: format!("pet-join-{worker}"),
                                reason: format!("confirmed pet {} has no owner_id", pet.id),
                            });
                        };
                        router
                            .dispatch(JoinEvent::Child {
                                parent_key: owner_id,
                                child: pet,
                            })
                            .await?;
                    }
                }
                debug!(worker, parents = join.parent_count(), "pet join drained");
                Ok(())
            }));
        }
        let pet_router: Router<Pet> = Router::new(pet_senders);

        // Front dispatch: resolve the event tag once and route
        while let Some(event) = events.recv().await {
            self.stats.events_processed.fetch_add(1, Ordering::Relaxed);
            match event {
                ChangeEvent::Owner(owner) => {
                    owner_router.dispatch(JoinEvent::Parent(owner)).await?;
                }
                ChangeEvent::Pet(pet) => {
                    pet_router.dispatch(JoinEvent::Parent(pet)).await?;
                }
                ChangeEvent::Visit(visit) => {
                    let visit = if self.enrichment.enabled {
                        enrich_visit(self.extractor.as_ref(), visit)
                    } else {
                        visit
                    };
                    let parent_key = visit.pet_id;
                    pet_router
                        .dispatch(JoinEvent::Child {
                            parent_key,
                            child: visit,
                        })
                        .await?;
                }
            }
        }

        // Input closed: cascade shutdown level by level
        info!("input closed, draining pipeline");
        drop(pet_router);
        drop(owner_router);
        for task in pet_tasks {
            join_stage(task, "pet-join").await?;
        }
        for task in owner_tasks {
            join_stage(task, "owner-join").await?;
        }
        join_stage(sink_task, "sink").await?;

        info!(
            events = self.stats.events_processed(),
            emitted = self.stats.documents_emitted(),
            "pipeline drained"
        );
        Ok(())
    }
}

async fn join_stage(task: JoinHandle<Result<()>>, stage: &str) -> Result<()> {
    task.await.map_err(|err| ProcessorError::StageTerminated {
        stage: stage.to_string(),
        reason: err.to_string(),
    })?
}
