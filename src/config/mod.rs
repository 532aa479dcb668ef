//! Configuration management for Shardwise
//!
//! Typed settings for the coordinator and the demonstration runner, loaded
//! from layered TOML/JSON/YAML files and environment variables (see [`core`]).

use crate::parallel::{CoordinatorConfig, PoolKind, Strategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod core;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardwiseConfig {
    /// Service name used in diagnostics and worker thread names
    pub service_name: String,

    /// Worker pool settings
    pub pool: PoolSettings,

    /// Defaults for `shardwise run` and `shardwise plan`
    pub run: RunSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKindSetting {
    Fixed,
    #[default]
    Elastic,
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub kind: PoolKindSetting,

    /// Number of workers (fixed pools only)
    pub size: usize,

    /// Seconds an elastic worker may sit idle before it exits
    pub idle_timeout_secs: u64,
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub strategy: Strategy,

    /// Items per shard for the size strategy
    pub shard_size: usize,

    /// Shard count for the threads strategy (0 = logical CPUs)
    pub threads: usize,

    /// Number of generated items for the demonstration run
    pub items: usize,

    /// Context value passed to every shard of the demonstration run
    pub context: String,
}

impl Default for ShardwiseConfig {
    fn default() -> Self {
        Self {
            service_name: crate::parallel::DEFAULT_SERVICE_NAME.to_string(),
            pool: PoolSettings::default(),
            run: RunSettings::default(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            kind: PoolKindSetting::Elastic,
            size: 4,
            idle_timeout_secs: 60,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Size,
            shard_size: crate::parallel::plan::MIN_SHARD_SIZE,
            threads: 0,
            items: 10_000,
            context: "external data".to_string(),
        }
    }
}

impl PoolSettings {
    pub fn pool_kind(&self) -> PoolKind {
        match self.kind {
            PoolKindSetting::Fixed => PoolKind::Fixed { size: self.size },
            PoolKindSetting::Elastic => PoolKind::Elastic {
                idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            },
        }
    }
}

impl RunSettings {
    /// Sizing parameter for the configured strategy
    pub fn param(&self) -> usize {
        match self.strategy {
            Strategy::Size => self.shard_size,
            Strategy::Threads if self.threads == 0 => crate::parallel::Coordinator::recommended_threads(),
            Strategy::Threads => self.threads,
        }
    }
}

impl ShardwiseConfig {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::named(self.service_name.clone()).with_pool(self.pool.pool_kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_builtin_policy() {
        let config = ShardwiseConfig::default();
        assert_eq!(config.service_name, "DefaultService");
        assert_eq!(
            config.coordinator_config().pool,
            PoolKind::Elastic {
                idle_timeout: Duration::from_secs(60)
            }
        );
        assert_eq!(config.run.param(), 2000);
    }

    #[test]
    fn test_fixed_pool_setting() {
        let pool = PoolSettings {
            kind: PoolKindSetting::Fixed,
            size: 6,
            ..Default::default()
        };
        assert_eq!(pool.pool_kind(), PoolKind::Fixed { size: 6 });
    }

    #[test]
    fn test_zero_threads_uses_logical_cpus() {
        let run = RunSettings {
            strategy: Strategy::Threads,
            threads: 0,
            ..Default::default()
        };
        assert_eq!(run.param(), num_cpus::get());
    }
}
