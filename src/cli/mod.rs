//! Command-line interface for promptrun
//!
//! - `args`: clap definitions
//! - `run`: entry point, config discovery, runtime, error reporting
//! - `commands`: subcommand implementations

pub mod args;
mod commands;
mod run;

#[cfg(test)]
mod tests;

pub use args::{Cli, Commands, RunArgs, parse_var};
pub use run::run;
