//! Process-level setup shared by the subcommands

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use super::CommonArgs;
use crate::config::AppConfig;
use crate::domain::knowledge_base::{validate_dimensions, EmbeddingSettings};
use crate::domain::PollPolicy;
use crate::infrastructure::aws::{
    AwsContext, BedrockAgentClient, OpenSearchServerlessClient, S3VectorsClient,
    SearchFieldMapping,
};
use crate::infrastructure::observability::{
    init_metrics, init_tracing, shutdown_tracing, PrometheusMetrics,
};
use crate::infrastructure::services::{
    BucketBackendSettings, CollectionBackendSettings, KnowledgeBaseProvisioner,
    ProvisionerSettings, StorageSettings,
};

pub(crate) struct Runtime {
    pub config: AppConfig,
    metrics: Option<PrometheusMetrics>,
}

impl Runtime {
    /// Load configuration, then install logging and metrics
    pub fn start(common: &CommonArgs) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = AppConfig::load().context("Failed to load configuration")?;
        if common.region.is_some() {
            config.aws.region = common.region.clone();
        }

        init_tracing(&config.logging, &config.observability.tracing);
        let metrics = init_metrics(&config.observability.metrics);

        Ok(Self { config, metrics })
    }

    /// Resolve AWS identity and wire the provisioner to the real services
    pub async fn provisioner(&self) -> anyhow::Result<KnowledgeBaseProvisioner> {
        let aws = AwsContext::load(&self.config.aws).await?;
        let settings = self.settings(&aws)?;

        let fallback = &self.config.storage.fallback;
        let field_mapping = SearchFieldMapping {
            vector_field: fallback.vector_field.clone(),
            text_field: fallback.text_field.clone(),
            metadata_field: fallback.metadata_field.clone(),
        };

        let mut provisioner = KnowledgeBaseProvisioner::new(
            Arc::new(BedrockAgentClient::new(&aws, field_mapping)),
            Arc::new(S3VectorsClient::new(&aws)),
            settings,
        );
        if fallback.enabled {
            provisioner = provisioner
                .with_search_collections(Arc::new(OpenSearchServerlessClient::new(&aws)?));
        }

        Ok(provisioner)
    }

    fn settings(&self, aws: &AwsContext) -> anyhow::Result<ProvisionerSettings> {
        let kb = &self.config.knowledge_base;
        let primary = &self.config.storage.primary;
        let fallback = &self.config.storage.fallback;
        let region = aws.region().context("AWS region not resolved")?;

        validate_dimensions(kb.embedding_dimensions)?;

        Ok(ProvisionerSettings {
            account_id: aws.account_id.clone(),
            caller_arn: aws.caller_arn.clone(),
            role_arn: kb.role_arn.clone(),
            embedding: EmbeddingSettings::new(
                kb.embedding_model_arn(region),
                kb.embedding_dimensions,
            ),
            kb_active_policy: kb.active_policy(),
            ingestion_poll_interval: self.config.ingestion.poll_interval(),
            ingestion_description: self.config.ingestion.description.clone(),
            association_description: kb.association_description.clone(),
            storage: StorageSettings {
                bucket: BucketBackendSettings {
                    dimension: kb.embedding_dimensions,
                    distance_metric: primary.distance_metric,
                    delete_settle: Duration::from_secs(primary.delete_settle_secs),
                    create_settle: Duration::from_secs(primary.create_settle_secs),
                },
                collection: CollectionBackendSettings {
                    dimension: kb.embedding_dimensions,
                    active_policy: PollPolicy::from_secs(
                        fallback.poll_interval_secs,
                        fallback.active_timeout_secs,
                    ),
                    index_settle: Duration::from_secs(fallback.index_settle_secs),
                    vector_field: fallback.vector_field.clone(),
                    text_field: fallback.text_field.clone(),
                    metadata_field: fallback.metadata_field.clone(),
                },
                fallback_enabled: fallback.enabled,
                extra_principals: kb.extra_principals.clone(),
            },
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            config: AppConfig::default(),
            metrics: None,
        }
    }

    /// Write the metrics textfile, if configured, and flush spans
    pub async fn finish(self) {
        if let (Some(metrics), Some(path)) = (&self.metrics, &self.config.output.metrics_path) {
            if let Err(e) = metrics.write_textfile(Path::new(path)).await {
                warn!(error = %e, "Failed to write metrics textfile");
            }
        }
        if self.config.observability.tracing.enabled {
            shutdown_tracing();
        }
    }
}
