//! Inspect command

use clap::Args;

use super::runtime::Runtime;
use super::CommonArgs;
use crate::domain::KnowledgeBaseDetails;

/// Arguments for the inspect command
#[derive(Args, Clone, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Print the knowledge base and its data sources as JSON
pub async fn run(args: InspectArgs) -> anyhow::Result<()> {
    let runtime = Runtime::start(&args.common)?;
    let details = describe(&runtime, &args).await;
    runtime.finish().await;

    match details? {
        Some(details) => {
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(())
        }
        None => anyhow::bail!(
            "No knowledge base provisioned for agent '{}'",
            args.common.agent_name
        ),
    }
}

async fn describe(
    runtime: &Runtime,
    args: &InspectArgs,
) -> anyhow::Result<Option<KnowledgeBaseDetails>> {
    let provisioner = runtime.provisioner().await?;
    Ok(provisioner.describe(&args.common.agent_name).await?)
}
