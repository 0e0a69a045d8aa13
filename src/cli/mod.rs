//! CLI module for the knowledge base provisioner
//!
//! Subcommands:
//! - `provision`: create or reuse the agent's knowledge base and sync its documents
//! - `ingest`: re-sync documents into an existing knowledge base
//! - `inspect`: print the knowledge base and data source configuration

pub mod ingest;
pub mod inspect;
pub mod provision;
mod runtime;

use clap::{Args, Parser, Subcommand};

/// PMP KB Provisioner - knowledge bases for managed conversational agents
#[derive(Parser)]
#[command(name = "pmp-kb-provisioner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision the knowledge base of an agent
    Provision(provision::ProvisionArgs),

    /// Re-run document ingestion for a provisioned knowledge base
    Ingest(ingest::IngestArgs),

    /// Print the knowledge base configuration of an agent
    Inspect(inspect::InspectArgs),
}

/// Options shared by every subcommand
#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Agent whose knowledge base is managed
    #[arg(long)]
    pub agent_name: String,

    /// AWS region (overrides config and the default chain)
    #[arg(long)]
    pub region: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
