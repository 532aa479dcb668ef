use anyhow::Result;
use clap::Parser;
use shardwise::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
