//! Shard planning
//!
//! Pure functions that turn a total item count and a sizing parameter into a
//! list of contiguous `[start, end)` ranges covering `[0, total)` exactly once.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Smallest shard the size-driven strategy will create
pub const MIN_SHARD_SIZE: usize = 2000;

/// Upper bound on the number of full shards the count-driven strategy creates
pub const MAX_THREADS: usize = 20;

/// Inputs smaller than this always run as a single shard under the count-driven strategy
pub const SINGLE_SHARD_THRESHOLD: usize = 2000;

/// How the sizing parameter of a run is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Fixed number of items per shard, remainder becomes one extra shard
    #[default]
    #[serde(alias = "size-driven")]
    Size,
    /// Fixed number of shards, remainder becomes one extra shard
    #[serde(alias = "count-driven", alias = "count")]
    Threads,
}

impl Strategy {
    /// Operation name used in diagnostics
    pub fn operation(&self) -> &'static str {
        match self {
            Strategy::Size => "process_by_shard_size",
            Strategy::Threads => "process_by_threads",
        }
    }

    pub fn plan(&self, total: usize, param: usize) -> Option<ShardPlan> {
        match self {
            Strategy::Size => plan_by_size(total, param),
            Strategy::Threads => plan_by_count(total, param),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "size" | "size-driven" => Ok(Strategy::Size),
            "threads" | "count" | "count-driven" => Ok(Strategy::Threads),
            other => Err(format!("unknown strategy '{other}' (expected 'size' or 'threads')")),
        }
    }
}

/// One contiguous slice of the input assigned to one work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shard {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Output of a planning strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardPlan {
    pub strategy: Strategy,
    /// Items per full shard after clamping
    pub shard_size: usize,
    /// Total number of items being sharded
    pub total: usize,
    pub shards: Vec<Shard>,
}

impl ShardPlan {
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// True when the shards are ordered, gap-free, non-overlapping and end at `total`
    pub fn verify_coverage(&self) -> bool {
        let mut cursor = 0;
        for shard in &self.shards {
            if shard.start != cursor || shard.end <= shard.start {
                return false;
            }
            cursor = shard.end;
        }
        cursor == self.total
    }
}

/// Split `total` items into shards of `shard_size` items, raised to [`MIN_SHARD_SIZE`]
///
/// Returns `None` when there is nothing to process.
pub fn plan_by_size(total: usize, shard_size: usize) -> Option<ShardPlan> {
    if total < 1 {
        return None;
    }
    let shard_size = shard_size.max(MIN_SHARD_SIZE);

    Some(ShardPlan {
        strategy: Strategy::Size,
        shard_size,
        total,
        shards: contiguous(total, shard_size, total / shard_size),
    })
}

/// Split `total` items into `requested_threads` even shards plus a remainder shard
///
/// The request is clamped to `1..=MAX_THREADS` and forced to 1 for inputs
/// below [`SINGLE_SHARD_THRESHOLD`]. Returns `None` when there is nothing to process.
pub fn plan_by_count(total: usize, requested_threads: usize) -> Option<ShardPlan> {
    if total < 1 {
        return None;
    }
    let threads = if total < SINGLE_SHARD_THRESHOLD {
        1
    } else {
        requested_threads.clamp(1, MAX_THREADS)
    };
    let per_shard = total / threads;

    Some(ShardPlan {
        strategy: Strategy::Threads,
        shard_size: per_shard,
        total,
        shards: contiguous(total, per_shard, threads),
    })
}

/// `full` shards of `size` items from index 0, then one shard for whatever is left.
/// Zero-length shards are never emitted.
fn contiguous(total: usize, size: usize, full: usize) -> Vec<Shard> {
    let mut shards: Vec<Shard> = (0..full)
        .map(|index| Shard {
            index,
            start: index * size,
            end: (index + 1) * size,
        })
        .filter(|shard| !shard.is_empty())
        .collect();

    let covered = full * size;
    if covered < total {
        shards.push(Shard {
            index: full,
            start: covered,
            end: total,
        });
    }
    shards
}
