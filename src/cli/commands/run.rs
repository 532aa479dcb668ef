use crate::cli::Output;
use crate::config::ShardwiseConfig;
use crate::parallel::{Coordinator, ShardProcessor, Strategy};
use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;
use serde::Serialize;
use std::sync::Arc;
use std::thread;

#[derive(Args, Default)]
pub struct RunArgs {
    /// Number of generated items
    #[arg(short = 'n', long)]
    pub items: Option<usize>,

    /// Sharding strategy: size or threads
    #[arg(short, long)]
    pub strategy: Option<Strategy>,

    /// Items per shard for the size strategy (raised to at least 2000)
    #[arg(long)]
    pub shard_size: Option<usize>,

    /// Number of shards for the threads strategy (0 = logical CPUs)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Context value handed to every shard
    #[arg(long)]
    pub context: Option<String>,

    /// Service name used for diagnostics and worker names
    #[arg(long)]
    pub service: Option<String>,
}

/// Command-line values layered over the loaded configuration
#[derive(Serialize, Default)]
pub(crate) struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    run: RunOverrides,
}

#[derive(Serialize, Default)]
struct RunOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shard_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl Overrides {
    pub(crate) fn new(
        items: Option<usize>,
        strategy: Option<Strategy>,
        shard_size: Option<usize>,
        threads: Option<usize>,
    ) -> Self {
        Self {
            service_name: None,
            run: RunOverrides {
                items,
                strategy,
                shard_size,
                threads,
                context: None,
            },
        }
    }
}

/// Demonstration processor: prints where each shard ran and what it received
pub struct PrintingProcessor;

impl ShardProcessor<String, String> for PrintingProcessor {
    fn process(&self, shard_index: usize, items: &[String], context: &String) -> Result<()> {
        let worker = thread::current().name().unwrap_or("unnamed").to_string();
        let first = items.first().map(String::as_str).unwrap_or("-");
        let last = items.last().map(String::as_str).unwrap_or("-");
        println!(
            "{} shard[{}] context>>> {} ---- items>> {}..{} ({})",
            style(worker).cyan(),
            style(shard_index).yellow(),
            context,
            first,
            last,
            items.len()
        );
        Ok(())
    }
}

pub fn execute(args: RunArgs, config_path: Option<&str>, output: Output) -> Result<()> {
    let mut overrides = Overrides::new(args.items, args.strategy, args.shard_size, args.threads);
    overrides.service_name = args.service;
    overrides.run.context = args.context;

    let config = ShardwiseConfig::load(config_path, Some(overrides))?;
    let coordinator = Coordinator::new(config.coordinator_config())
        .context("Failed to start worker pool")?;

    let items: Arc<[String]> = (0..config.run.items)
        .map(|i| format!("item-{i}"))
        .collect::<Vec<_>>()
        .into();
    let processor = Arc::new(PrintingProcessor);
    let context = Arc::new(config.run.context.clone());

    output.info(&format!(
        "Processing {} items with the {:?} strategy (param {})",
        items.len(),
        config.run.strategy,
        config.run.param()
    ));

    let result = coordinator.execute(
        &items,
        &processor,
        config.run.param(),
        &context,
        config.run.strategy,
    );
    coordinator.close();

    match result {
        Ok(report) => {
            output.action_result(
                &report.summary.service,
                &format!(
                    "{} shards of {} ({} items) in {}ms",
                    report.summary.shard_count,
                    report.summary.shard_size,
                    report.summary.total,
                    report.elapsed.as_millis()
                ),
                true,
            );
            Ok(())
        }
        Err(e) => {
            output.error(&e.to_string());
            bail!("run failed: {e}")
        }
    }
}
