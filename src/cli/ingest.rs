//! Ingest command - re-sync documents into an existing knowledge base

use std::time::Duration;

use anyhow::Context;
use clap::Args;

use super::runtime::Runtime;
use super::CommonArgs;
use crate::config::minutes;
use crate::domain::IngestionOutcome;

/// Arguments for the ingest command
#[derive(Args, Clone, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Ingestion budget in minutes (overrides config)
    #[arg(long)]
    pub ingestion_timeout: Option<u64>,
}

/// Run the ingest command, printing the ingestion outcome as JSON
pub async fn run(args: IngestArgs) -> anyhow::Result<()> {
    let runtime = Runtime::start(&args.common)?;
    let outcome = sync(&runtime, &args).await;
    runtime.finish().await;

    let outcome = outcome?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_completed() {
        anyhow::bail!(
            "Ingestion did not complete: {}",
            outcome.error.as_deref().unwrap_or("job failed")
        );
    }
    Ok(())
}

async fn sync(runtime: &Runtime, args: &IngestArgs) -> anyhow::Result<IngestionOutcome> {
    let timeout = ingestion_timeout(runtime, args);
    let provisioner = runtime.provisioner().await?;
    provisioner
        .sync_documents(&args.common.agent_name, timeout)
        .await
        .with_context(|| {
            format!(
                "Failed to sync documents for agent '{}'",
                args.common.agent_name
            )
        })
}

fn ingestion_timeout(runtime: &Runtime, args: &IngestArgs) -> Duration {
    args.ingestion_timeout
        .map(minutes)
        .unwrap_or_else(|| runtime.config.ingestion.timeout())
}
