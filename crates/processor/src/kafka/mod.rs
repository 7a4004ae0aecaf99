//! Change-capture source boundary
//!
//! Consumes Debezium-style change records from Kafka and converts them
//! into typed [`ChangeEvent`](crate::event::ChangeEvent)s before they
//! reach the join. Kafka's key-hash partitioning is the external
//! partition router of the design: all records for one row key arrive
//! in order on one partition.

pub mod source;

pub use source::ChangeEventSource;
