//! CLI module for the edgestack tool.
//!
//! This module provides the command-line interface for assembling,
//! planning and publishing topologies.

mod commands;
mod output;

pub use commands::{Cli, Commands, ContextCommands, OutputFormat};
pub use output::OutputFormatter;
