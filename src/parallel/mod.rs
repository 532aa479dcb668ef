//! Sharded parallel execution framework
//!
//! This module splits a large slice into contiguous shards, runs each shard on a
//! managed worker pool, and blocks the caller until every shard has reported.
//! Business logic is written once as a single-shard [`ShardProcessor`].
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Shard Planning**: Computes `[start, end)` ranges for the size-driven and count-driven strategies
//! - **Worker Management**: Owns a fixed or elastic pool of named worker threads
//! - **Completion Tracking**: One latch per run, released by a drop guard on every exit path
//! - **Failure Isolation**: Errors and panics inside a shard become per-shard outcomes
//!
//! ## What This Module Does NOT Do:
//! - **Result Aggregation**: Each shard performs its own side effects
//! - **Re-sharding or Work Stealing**: The plan is fixed once a run starts
//! - **Retries**: A failed run is reported; the caller decides whether to run again
//!
//! # Data Flow
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │   Caller    │    │  Coordinator │    │  WorkerPool  │    │   Latch      │
//! │             │───▶│              │───▶│              │───▶│              │
//! │ • items     │    │ • plan       │    │ • fixed      │    │ • one guard  │
//! │ • processor │    │ • dispatch   │    │ • elastic    │    │   per shard  │
//! │ • context   │    │ • wait       │    │ • shutdown   │    │ • interrupt  │
//! └─────────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use shardwise::parallel::Coordinator;
//! use std::sync::Arc;
//!
//! let coordinator = Coordinator::named("Example");
//! let items: Arc<[u64]> = (0..10_000).collect::<Vec<_>>().into();
//! let processor = Arc::new(|_shard: usize, items: &[u64], label: &String| -> anyhow::Result<()> {
//!     assert!(!items.is_empty());
//!     assert_eq!(label, "external data");
//!     Ok(())
//! });
//! let context = Arc::new("external data".to_string());
//!
//! // 3000 items per shard: [0,3000) [3000,6000) [6000,9000) [9000,10000)
//! assert!(coordinator.process_by_shard_size(&items, &processor, 3000, &context));
//!
//! // one shard per logical CPU, capped at 20
//! let threads = Coordinator::recommended_threads();
//! assert!(coordinator.process_by_threads(&items, &processor, threads, &context));
//!
//! coordinator.close();
//! ```

pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod latch;
pub mod plan;
pub mod pool;

// Re-export main types for easier access
pub use coordinator::{
    Coordinator, CoordinatorConfig, DEFAULT_SERVICE_NAME, Interrupter, RunReport, ShardProcessor,
};
pub use diagnostics::{DiagnosticSink, RunFailed, RunSummary, TracingSink};
pub use error::{CoordinatorError, PoolError};
pub use latch::{ShardOutcome, ShardStatus};
pub use plan::{Shard, ShardPlan, Strategy, plan_by_count, plan_by_size};
pub use pool::{PoolKind, WorkerPool};
