//! Elasticsearch document sink
//!
//! Issues `_update` requests with `doc_as_upsert` so the index always
//! holds the latest full document per owner id. Failed requests are
//! retried with exponential backoff up to the configured limit, then
//! surfaced as a sink error for the caller to log; the join state is
//! never touched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use petclinic_indexer_types::Owner;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ElasticSinkConfig;
use crate::error::{Result, SinkError};

use super::DocumentSink;

/// Backoff doubling stops here; larger retry counts keep the ceiling.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Counters for sink activity.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    upserts: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

impl SinkMetrics {
    pub fn upserts(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Upserting sink backed by an Elasticsearch node.
pub struct ElasticSink {
    client: reqwest::Client,
    config: ElasticSinkConfig,
    metrics: SinkMetrics,
}

impl ElasticSink {
    pub fn new(config: ElasticSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| SinkError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            config,
            metrics: SinkMetrics::default(),
        })
    }

    pub fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    fn update_url(&self, id: i32) -> String {
        format!(
            "{}/{}/_update/{id}",
            self.config.url.trim_end_matches('/'),
            self.config.index
        )
    }

    /// Delay before retry `attempt` (1-based): exponential from the
    /// configured base, capped so arbitrary retry limits cannot
    /// overflow the arithmetic.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = (attempt - 1).min(MAX_BACKOFF_EXPONENT);
        Duration::from_millis(self.config.base_backoff_ms.saturating_mul(1 << exponent))
    }

    /// Body of the update request: partial doc plus `doc_as_upsert`.
    fn update_body(owner: &Owner) -> serde_json::Value {
        json!({
            "doc": owner,
            "doc_as_upsert": true,
        })
    }

    async fn try_upsert(&self, owner: &Owner) -> std::result::Result<(), SinkError> {
        let response = self
            .client
            .post(self.update_url(owner.id))
            .json(&Self::update_body(owner))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DocumentSink for ElasticSink {
    async fn upsert(&self, owner: &Owner) -> std::result::Result<(), SinkError> {
        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                self.metrics.retries.fetch_add(1, Ordering::Relaxed);
                sleep(self.backoff_delay(attempt)).await;
            }
            match self.try_upsert(owner).await {
                Ok(()) => {
                    self.metrics.upserts.fetch_add(1, Ordering::Relaxed);
                    debug!(id = owner.id, "upserted owner document");
                    return Ok(());
                }
                Err(err) => {
                    warn!(id = owner.id, attempt, %err, "upsert attempt failed");
                    last_err = Some(err);
                }
            }
        }

        self.metrics.failures.fetch_add(1, Ordering::Relaxed);
        Err(SinkError::UpsertFailed {
            id: owner.id,
            attempts: self.config.max_retries + 1,
            reason: last_err
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
