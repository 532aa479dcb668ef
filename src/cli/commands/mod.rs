use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod config;
pub mod plan;
pub mod run;
pub mod version;

#[derive(Parser)]
#[command(
    name = "shardwise",
    version = env!("CARGO_PKG_VERSION"),
    about = "Split large inputs into shards and process them on a worker pool",
    long_about = "Shardwise splits a large input into contiguous shards, runs each shard \
                  on a fixed or elastic worker pool, and waits for every shard to finish."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process generated items with the printing processor
    Run(run::RunArgs),
    /// Show how an input would be split without processing it
    Plan(plan::PlanArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Show version information
    Version(version::VersionArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        // Set up logging based on verbosity
        setup_logging(self.verbose, self.quiet);

        let output = crate::cli::Output::new(self.quiet);
        match self.command {
            Some(Commands::Run(args)) => run::execute(args, self.config.as_deref(), output),
            Some(Commands::Plan(args)) => plan::execute(args, self.config.as_deref(), output),
            Some(Commands::Config(args)) => config::execute(args, self.config.as_deref()),
            Some(Commands::Version(args)) => version::execute(args),
            None => {
                println!("Run 'shardwise --help' for usage information");
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // `info` is needed to see run START/FINISH lines
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info"),
        2 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();
}
