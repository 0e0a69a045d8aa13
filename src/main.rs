use clap::Parser;
use pmp_kb_provisioner::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Provision(args) => cli::provision::run(args).await,
        Command::Ingest(args) => cli::ingest::run(args).await,
        Command::Inspect(args) => cli::inspect::run(args).await,
    }
}
