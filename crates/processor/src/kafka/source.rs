//! Kafka change-event source
//!
//! Wraps an rdkafka `StreamConsumer` subscribed to the owners, pets
//! and visits topics. Each message is a Debezium change envelope; the
//! row image in `after` is converted to a typed record here, at the
//! boundary, so the pipeline only ever sees well-formed events.
//!
//! Error policy per the boundary contract: a malformed record (missing
//! identity or foreign key) is logged and dropped; a message from a
//! topic outside the routed set is a contract violation and aborts;
//! transient consumer errors are logged and the loop continues.
//!
//! Offsets are committed here, never auto-committed by rdkafka: a
//! record's offset becomes eligible for commit only after the record
//! has been handed to the pipeline (or terminally dropped), so a crash
//! replays uncommitted records instead of losing them. Delivery is
//! at-least-once, which the join absorbs by construction.

use std::time::Duration;

use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Timestamp;
use rdkafka::Message;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

use petclinic_indexer_types::{Owner, Pet, Visit};

use crate::config::{CommitStrategy, SourceConfig};
use crate::error::{RecordError, Result};
use crate::event::ChangeEvent;

/// Source table a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Owners,
    Pets,
    Visits,
}

/// Kafka consumer yielding typed change events.
pub struct ChangeEventSource {
    consumer: StreamConsumer,
    owners_topic: String,
    pets_topic: String,
    visits_topic: String,
    commit_strategy: CommitStrategy,
    commit_interval: Duration,
}

/// rdkafka client configuration for `config`. Auto-commit is always
/// disabled; this source commits consumed offsets itself.
fn consumer_config(config: &SourceConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    for (key, value) in &config.extra_config {
        client.set(key, value);
    }
    // Fixed settings win over extra_config: the commit contract is not
    // overridable.
    client
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("auto.offset.reset", &config.auto_offset_reset)
        .set("enable.auto.commit", "false");
    client
}

impl ChangeEventSource {
    /// Create the consumer and subscribe to the configured topics.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let consumer: StreamConsumer = consumer_config(config).create()?;
        let topics = config.topics();
        consumer.subscribe(&topics)?;
        info!(?topics, group_id = %config.group_id, "subscribed to change topics");

        Ok(Self {
            consumer,
            owners_topic: config.owners_topic.clone(),
            pets_topic: config.pets_topic.clone(),
            visits_topic: config.visits_topic.clone(),
            commit_strategy: config.commit_strategy,
            commit_interval: Duration::from_secs(config.commit_interval_secs),
        })
    }

    /// Consume until the downstream channel closes or a contract
    /// violation aborts the pipeline. Offsets for everything handed
    /// off so far are committed per the configured strategy; a record
    /// that never reached the pipeline is left uncommitted for replay.
    pub async fn run(self, tx: mpsc::Sender<ChangeEvent>) -> Result<()> {
        // First tick lands one interval in, not immediately
        let mut commit_tick =
            time::interval_at(time::Instant::now() + self.commit_interval, self.commit_interval);
        loop {
            let message = tokio::select! {
                _ = commit_tick.tick() => {
                    if self.commit_strategy == CommitStrategy::Periodic {
                        self.commit();
                    }
                    continue;
                }
                received = self.consumer.recv() => match received {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(%err, "transient consumer error");
                        continue;
                    }
                },
            };

            let table = match self.route(message.topic()) {
                Ok(table) => table,
                // Contract violation: abort without committing so the
                // record is replayed for inspection.
                Err(err) => return Err(err.into()),
            };

            if let Some(payload) = message.payload() {
                match decode_change(table, payload) {
                    Ok(Some(event)) => {
                        let lag_ms = match message.timestamp() {
                            Timestamp::CreateTime(ms) | Timestamp::LogAppendTime(ms) => {
                                Some(Utc::now().timestamp_millis() - ms)
                            }
                            Timestamp::NotAvailable => None,
                        };
                        debug!(table = event.table(), id = event.id(), lag_ms, "change record");
                        if tx.send(event).await.is_err() {
                            // No commit: this record never reached the
                            // pipeline and must be replayed on restart.
                            info!("pipeline closed, stopping source");
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(err) if err.is_fatal() => return Err(err.into()),
                    Err(err) => {
                        warn!(%err, topic = message.topic(), "dropping malformed change record");
                    }
                }
            }
            // else: compaction tombstone, nothing to apply

            // The record is handed off or terminally dropped; its
            // offset may now be committed.
            if self.commit_strategy == CommitStrategy::Manual {
                self.commit();
            }
        }
    }

    /// Commit the consumer position for everything handled so far.
    fn commit(&self) {
        if let Err(err) = self.consumer.commit_consumer_state(CommitMode::Async) {
            warn!(%err, "offset commit failed");
        }
    }

    fn route(&self, topic: &str) -> std::result::Result<Table, RecordError> {
        if topic == self.owners_topic {
            Ok(Table::Owners)
        } else if topic == self.pets_topic {
            Ok(Table::Pets)
        } else if topic == self.visits_topic {
            Ok(Table::Visits)
        } else {
            Err(RecordError::UnknownTable {
                table: topic.to_string(),
            })
        }
    }
}

/// Decode one Debezium change envelope into a typed event.
///
/// Returns `Ok(None)` for deletes (no `after` image). Handles both
/// schema-wrapped (`{"schema":..,"payload":{..}}`) and plain
/// envelopes.
fn decode_change(table: Table, bytes: &[u8]) -> std::result::Result<Option<ChangeEvent>, RecordError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| RecordError::Envelope {
        reason: err.to_string(),
    })?;
    let envelope = value.get("payload").unwrap_or(&value);

    let after = match envelope.get("after") {
        Some(after) if !after.is_null() => after,
        _ => return Ok(None),
    };

    let table_name = match table {
        Table::Owners => "owners",
        Table::Pets => "pets",
        Table::Visits => "visits",
    };

    let id = after
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| RecordError::MissingId {
            table: table_name.to_string(),
        })? as i32;

    let event = match table {
        Table::Owners => ChangeEvent::Owner(typed_row::<Owner>(table_name, after)?),
        Table::Pets => {
            if after.get("owner_id").and_then(Value::as_i64).is_none() {
                return Err(RecordError::MissingForeignKey {
                    table: table_name.to_string(),
                    id,
                });
            }
            ChangeEvent::Pet(typed_row::<Pet>(table_name, after)?)
        }
        Table::Visits => {
            if after.get("pet_id").and_then(Value::as_i64).is_none() {
                return Err(RecordError::MissingForeignKey {
                    table: table_name.to_string(),
                    id,
                });
            }
            ChangeEvent::Visit(typed_row::<Visit>(table_name, after)?)
        }
    };

    Ok(Some(event))
}

fn typed_row<T: serde::de::DeserializeOwned>(
    table: &str,
    after: &Value,
) -> std::result::Result<T, RecordError> {
    serde_json::from_value(after.clone()).map_err(|err| RecordError::Envelope {
        reason: format!("{table} row: {err}"),
    })
}
