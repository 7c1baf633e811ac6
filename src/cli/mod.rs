//! CLI layer for govreporter.
//!
//! Provides the command-line interface using clap, with subcommands for
//! serving MCP, ingesting documents, and inspecting stored state.

pub mod commands;
pub mod parser;

pub use commands::execute;
pub use parser::{Cli, Commands, InfoCommands, IngestArgs, IngestCommands};
