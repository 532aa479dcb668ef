//! # Shardwise - sharded parallel processing
//!
//! Write business logic for a single shard; Shardwise splits the input,
//! dispatches the shards to a managed worker pool, and blocks until all of
//! them are done.
//!
//! ## Features
//!
//! - **Two sizing strategies**: fixed items per shard, or a fixed number of shards
//! - **Fixed or elastic pools**: persistent workers, or workers that grow on demand and retire when idle
//! - **Failure isolation**: a failing or panicking shard fails the run instead of hanging it
//! - **Interruptible waits**: a blocked run can be woken from another thread
//!
//! ## Quick Start
//!
//! ```bash
//! # Show how 10,000 items split into 3000-item shards
//! shardwise plan --items 10000 --shard-size 3000
//!
//! # Run generated items through the printing processor on 4 shards
//! shardwise -v run --items 10000 --strategy threads --threads 4
//! ```

pub mod cli;
pub mod config;
pub mod parallel;

pub use config::ShardwiseConfig;
pub use parallel::{
    Coordinator, CoordinatorConfig, CoordinatorError, PoolKind, Shard, ShardPlan, ShardProcessor,
    Strategy, WorkerPool,
};

/// Result type alias for Shardwise operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
