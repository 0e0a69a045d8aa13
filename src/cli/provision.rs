//! Provision command - create or reuse an agent's knowledge base

use anyhow::Context;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use tracing::{error, info};

use super::runtime::Runtime;
use super::CommonArgs;
use crate::config::{minutes, AppConfig, OutputConfig};
use crate::domain::knowledge_base::{
    ChunkingPolicy, SourceLocation, DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_PERCENTAGE,
};
use crate::domain::{DomainError, ProvisionRequest, ProvisioningResult};
use crate::infrastructure::output::ResultWriter;

/// Arguments for the provision command
#[derive(Args, Clone, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Source documents location (s3://bucket/prefix)
    #[arg(long)]
    pub s3_uri: String,

    /// Run the step at all; `false` writes a skipped result without touching AWS
    #[arg(
        long,
        action = ArgAction::Set,
        default_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub enable: bool,

    /// Maximum tokens per chunk
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Overlap between consecutive chunks, in percent
    #[arg(long, default_value_t = DEFAULT_OVERLAP_PERCENTAGE)]
    pub overlap_percentage: u32,

    /// Ingestion budget in minutes (overrides config)
    #[arg(long)]
    pub ingestion_timeout: Option<u64>,

    /// Create resources but do not start ingestion
    #[arg(long)]
    pub skip_ingestion: bool,

    /// Service role for new knowledge bases (overrides config)
    #[arg(long, env = "KB_ROLE_ARN")]
    pub role_arn: Option<String>,

    /// Result JSON path (overrides config)
    #[arg(long)]
    pub output: Option<String>,
}

type Outcome = Result<ProvisioningResult, (ProvisioningResult, DomainError)>;

/// Run the provision command
///
/// The result file is written on every path, including fatal failures and a
/// configuration that cannot be loaded, which are then reported through a
/// non-zero exit.
pub async fn run(args: ProvisionArgs) -> anyhow::Result<()> {
    let mut runtime = match Runtime::start(&args.common) {
        Ok(runtime) => runtime,
        Err(e) => {
            let writer = ResultWriter::new(result_path(&args, None));
            return report(&writer, &args, Err(startup_failure(&args, e))).await;
        }
    };
    if args.role_arn.is_some() {
        runtime.config.knowledge_base.role_arn = args.role_arn.clone();
    }
    let writer = ResultWriter::new(result_path(&args, Some(&runtime.config)));

    let outcome = provision(&runtime, &args).await;
    let reported = report(&writer, &args, outcome).await;
    runtime.finish().await;
    reported
}

/// `--output`, then the configured path, then the default path
fn result_path(args: &ProvisionArgs, config: Option<&AppConfig>) -> String {
    args.output
        .clone()
        .or_else(|| config.map(|config| config.output.result_path.clone()))
        .unwrap_or_else(|| OutputConfig::default().result_path)
}

fn startup_failure(args: &ProvisionArgs, error: anyhow::Error) -> (ProvisioningResult, DomainError) {
    let source = DomainError::configuration(format!("{:#}", error));
    let failure = ProvisioningResult::new(&args.common.agent_name, args.enable).into_failure(source);
    (*failure.result, failure.source)
}

/// Write the result record, then turn a fatal failure into the command error
async fn report(writer: &ResultWriter, args: &ProvisionArgs, outcome: Outcome) -> anyhow::Result<()> {
    let (result, failure) = match outcome {
        Ok(result) => (result, None),
        Err((result, e)) => (result, Some(e)),
    };
    writer
        .write(&result)
        .await
        .context("Failed to write provisioning result")?;

    match failure {
        Some(e) => Err(anyhow::Error::new(e).context(format!(
            "Knowledge base provisioning failed for agent '{}'",
            args.common.agent_name
        ))),
        None => Ok(()),
    }
}

async fn provision(runtime: &Runtime, args: &ProvisionArgs) -> Outcome {
    let agent_name = args.common.agent_name.as_str();
    let fail = |e: DomainError| {
        error!(agent = agent_name, error = %e, "Provisioning could not start");
        let failure = ProvisioningResult::new(agent_name, args.enable).into_failure(e);
        (*failure.result, failure.source)
    };

    if !args.enable {
        info!(agent = agent_name, "Knowledge base creation disabled");
        return Ok(ProvisioningResult::new(agent_name, false).finish());
    }

    let request = build_request(runtime, args).map_err(fail)?;

    let provisioner = match runtime.provisioner().await {
        Ok(provisioner) => provisioner,
        Err(e) => {
            let e = match e.downcast::<DomainError>() {
                Ok(domain) => domain,
                Err(other) => DomainError::configuration(format!("{:#}", other)),
            };
            return Err(fail(e));
        }
    };

    provisioner
        .provision(&request)
        .await
        .map_err(|failure| (*failure.result, failure.source))
}

fn build_request(runtime: &Runtime, args: &ProvisionArgs) -> Result<ProvisionRequest, DomainError> {
    let source = SourceLocation::parse(&args.s3_uri)?;
    let chunking = ChunkingPolicy::new(args.max_tokens, args.overlap_percentage)?;
    let timeout = args
        .ingestion_timeout
        .map(minutes)
        .unwrap_or_else(|| runtime.config.ingestion.timeout());

    Ok(ProvisionRequest::new(&args.common.agent_name, source)
        .with_chunking(chunking)
        .with_skip_ingestion(args.skip_ingestion)
        .with_ingestion_timeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::cli::{Cli, Command};
    use crate::domain::OverallStatus;
    use clap::Parser;

    fn parse(args: &[&str]) -> ProvisionArgs {
        let mut argv = vec!["pmp-kb-provisioner", "provision"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Provision(args) => args,
            _ => panic!("expected provision command"),
        }
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--agent-name", "support", "--s3-uri", "s3://docs/support/"]);

        assert!(args.enable);
        assert_eq!(args.max_tokens, 1024);
        assert_eq!(args.overlap_percentage, 20);
        assert!(!args.skip_ingestion);
        assert!(args.ingestion_timeout.is_none());
    }

    #[test]
    fn test_enable_accepts_false() {
        let args = parse(&[
            "--agent-name",
            "support",
            "--s3-uri",
            "s3://docs",
            "--enable",
            "false",
            "--skip-ingestion",
            "--ingestion-timeout",
            "45",
        ]);

        assert!(!args.enable);
        assert!(args.skip_ingestion);
        assert_eq!(args.ingestion_timeout, Some(45));
    }

    #[test]
    fn test_request_carries_explicit_chunking_and_timeout() {
        let args = parse(&[
            "--agent-name",
            "support",
            "--s3-uri",
            "s3://docs/support/",
            "--max-tokens",
            "512",
            "--overlap-percentage",
            "10",
            "--ingestion-timeout",
            "5",
        ]);
        let runtime = Runtime::for_tests();

        let request = build_request(&runtime, &args).unwrap();

        assert_eq!(request.chunking.max_tokens, 512);
        assert_eq!(request.chunking.overlap_percentage, 10);
        assert_eq!(request.ingestion_timeout, Duration::from_secs(300));
        assert_eq!(request.source.bucket(), "docs");
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let runtime = Runtime::for_tests();

        let bad_uri = parse(&["--agent-name", "support", "--s3-uri", "https://docs"]);
        assert!(matches!(
            build_request(&runtime, &bad_uri),
            Err(DomainError::Validation { .. })
        ));

        let bad_overlap = parse(&[
            "--agent-name",
            "support",
            "--s3-uri",
            "s3://docs",
            "--overlap-percentage",
            "100",
        ]);
        assert!(build_request(&runtime, &bad_overlap).is_err());
    }

    #[tokio::test]
    async fn test_disabled_run_writes_skipped_result_without_aws() {
        let args = parse(&[
            "--agent-name",
            "support",
            "--s3-uri",
            "s3://docs",
            "--enable",
            "false",
        ]);
        let runtime = Runtime::for_tests();

        let result = provision(&runtime, &args).await.unwrap();

        assert!(!result.enabled);
        assert_eq!(result.status, OverallStatus::Skipped);
    }

    #[test]
    fn test_huge_ingestion_timeout_saturates() {
        let args = parse(&[
            "--agent-name",
            "support",
            "--s3-uri",
            "s3://docs",
            "--ingestion-timeout",
            "18446744073709551615",
        ]);
        let runtime = Runtime::for_tests();

        let request = build_request(&runtime, &args).unwrap();

        assert_eq!(request.ingestion_timeout, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_result_path_precedence() {
        let mut config = AppConfig::default();
        config.output.result_path = "/tmp/configured.json".to_string();

        let defaults = parse(&["--agent-name", "support", "--s3-uri", "s3://docs"]);
        assert_eq!(
            result_path(&defaults, None),
            "/opt/ml/processing/output/kb_output.json"
        );
        assert_eq!(result_path(&defaults, Some(&config)), "/tmp/configured.json");

        let explicit = parse(&[
            "--agent-name",
            "support",
            "--s3-uri",
            "s3://docs",
            "--output",
            "/tmp/explicit.json",
        ]);
        assert_eq!(result_path(&explicit, Some(&config)), "/tmp/explicit.json");
    }

    #[tokio::test]
    async fn test_startup_failure_still_writes_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb_output.json");
        let args = parse(&[
            "--agent-name",
            "support",
            "--s3-uri",
            "s3://docs",
            "--output",
            path.to_str().unwrap(),
        ]);
        let writer = ResultWriter::new(result_path(&args, None));

        let outcome = Err(startup_failure(&args, anyhow::anyhow!("invalid config file")));
        let error = report(&writer, &args, outcome).await.unwrap_err();

        assert!(format!("{:#}", error).contains("invalid config file"));
        let written: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(written["status"], "error");
        assert_eq!(written["agent_name"], "support");
        assert!(written["error"].as_str().unwrap().contains("invalid config file"));
    }
}
