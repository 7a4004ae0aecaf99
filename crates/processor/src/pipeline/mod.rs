//! Pipeline composition
//!
//! Wires the two join levels together: visits join into pets keyed by
//! pet id, the resulting pets join into owners keyed by owner id, and
//! confirmed owner documents flow to the sink. Each level runs a pool
//! of worker tasks, each owning its join state exclusively; a hash
//! router guarantees all events for one key reach the same worker in
//! arrival order.

pub mod router;
pub mod runner;

pub use router::{worker_index, Router};
pub use runner::{IndexingPipeline, PipelineStats};
