//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Edgestack - Declarative container-service topology assembler for AWS.
#[derive(Parser, Debug)]
#[command(name = "edgestack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "EDGESTACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the lookup context file.
    #[arg(long, global = true, env = "EDGESTACK_CONTEXT")]
    pub context: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new edgestack project.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the topology configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Assemble the topology and write the cloud assembly.
    Synth {
        /// Output directory (defaults to the configured artifact path).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show the deployment plan against the last published assembly.
    Plan {
        /// Show per-declaration diff information.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Publish the assembly to the artifact store.
    Publish {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the stack outputs.
    Outputs,

    /// Manage the lookup context.
    Context {
        /// Context subcommand.
        #[command(subcommand)]
        command: ContextCommands,
    },
}

/// Lookup context subcommands.
#[derive(Subcommand, Debug)]
pub enum ContextCommands {
    /// Show the current context.
    Show,

    /// Record the hosted zone of a domain.
    Zone {
        /// Domain name.
        domain: String,

        /// Hosted zone id.
        #[arg(long, required_unless_present = "absent")]
        zone_id: Option<String>,

        /// Record the zone as known to be absent.
        #[arg(long, conflicts_with = "zone_id")]
        absent: bool,
    },

    /// Record the availability zones of a region.
    Zones {
        /// Region name.
        region: String,

        /// Zone names.
        #[arg(required = true)]
        zones: Vec<String>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_with_globals() {
        let cli = Cli::try_parse_from([
            "edgestack",
            "plan",
            "--detailed",
            "--config",
            "stack.yaml",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("stack.yaml")));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Plan { detailed: true }));
    }

    #[test]
    fn test_context_zone_requires_id_or_absent() {
        assert!(Cli::try_parse_from(["edgestack", "context", "zone", "example.com"]).is_err());

        let cli =
            Cli::try_parse_from(["edgestack", "context", "zone", "example.com", "--absent"]).unwrap();
        match cli.command {
            Commands::Context {
                command: ContextCommands::Zone { domain, zone_id, absent },
            } => {
                assert_eq!(domain, "example.com");
                assert!(zone_id.is_none());
                assert!(absent);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
