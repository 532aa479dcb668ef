use super::run::Overrides;
use crate::cli::Output;
use crate::config::ShardwiseConfig;
use crate::parallel::Strategy;
use anyhow::{Result, anyhow};
use clap::Args;

#[derive(Args, Default)]
pub struct PlanArgs {
    /// Number of items to split
    #[arg(short = 'n', long)]
    pub items: Option<usize>,

    /// Sharding strategy: size or threads
    #[arg(short, long)]
    pub strategy: Option<Strategy>,

    /// Items per shard for the size strategy
    #[arg(long)]
    pub shard_size: Option<usize>,

    /// Number of shards for the threads strategy (0 = logical CPUs)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: PlanArgs, config_path: Option<&str>, output: Output) -> Result<()> {
    let overrides = Overrides::new(args.items, args.strategy, args.shard_size, args.threads);
    let config = ShardwiseConfig::load(config_path, Some(overrides))?;

    let plan = config
        .run
        .strategy
        .plan(config.run.items, config.run.param())
        .ok_or_else(|| anyhow!("nothing to plan: item count must be at least 1"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    output.header(&format!(
        "{} shards for {} items ({})",
        plan.shard_count(),
        plan.total,
        plan.strategy.operation()
    ));
    output.table_row("shard size", &plan.shard_size.to_string());
    for shard in &plan.shards {
        output.table_row(
            &format!("shard {}", shard.index),
            &format!("[{}, {}) {} items", shard.start, shard.end, shard.len()),
        );
    }
    Ok(())
}
