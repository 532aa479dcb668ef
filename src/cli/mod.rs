//! Command-line interface for Shardwise
//!
//! A thin demonstration surface over [`crate::parallel`]: plan a split, run
//! generated items through a printing processor, inspect configuration.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
