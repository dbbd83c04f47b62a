//! Command-line interface for ps-forge.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, GenerateArgs};
