use std::time::Duration;

use serde::Deserialize;

use crate::domain::{DistanceMetric, PollPolicy};
use crate::infrastructure::observability::ObservabilityConfig;

/// Application configuration
///
/// Every field has a default, so a missing config file still yields a
/// working configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub observability: ObservabilityConfig,
    pub aws: AwsConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub ingestion: IngestionConfig,
    pub storage: StorageConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AwsConfig {
    pub region: Option<String>,
    /// Endpoint override, e.g. for a local emulator
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// Service role assumed by new knowledge bases
    pub role_arn: Option<String>,
    pub embedding_model_id: String,
    pub embedding_dimensions: u32,
    pub active_poll_interval_secs: u64,
    pub active_timeout_secs: u64,
    pub association_description: String,
    /// Extra principals granted data access to a fallback collection
    pub extra_principals: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub timeout_minutes: u64,
    pub poll_interval_secs: u64,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub primary: PrimaryStorageConfig,
    pub fallback: FallbackStorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrimaryStorageConfig {
    pub distance_metric: DistanceMetric,
    pub delete_settle_secs: u64,
    pub create_settle_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackStorageConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    pub active_timeout_secs: u64,
    pub index_settle_secs: u64,
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the provisioning result JSON is written
    pub result_path: String,
    /// Prometheus textfile written at exit, if set
    pub metrics_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            role_arn: None,
            embedding_model_id: "amazon.titan-embed-text-v2:0".to_string(),
            embedding_dimensions: 1024,
            active_poll_interval_secs: 10,
            active_timeout_secs: 300,
            association_description: "Product and policy knowledge base".to_string(),
            extra_principals: Vec::new(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            poll_interval_secs: 10,
            description: "Automatic document sync".to_string(),
        }
    }
}

impl Default for PrimaryStorageConfig {
    fn default() -> Self {
        Self {
            distance_metric: DistanceMetric::Cosine,
            delete_settle_secs: 10,
            create_settle_secs: 60,
        }
    }
}

impl Default for FallbackStorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 10,
            active_timeout_secs: 600,
            index_settle_secs: 30,
            vector_field: "bedrock-knowledge-base-default-vector".to_string(),
            text_field: "AMAZON_BEDROCK_TEXT_CHUNK".to_string(),
            metadata_field: "AMAZON_BEDROCK_METADATA".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            result_path: "/opt/ml/processing/output/kb_output.json".to_string(),
            metrics_path: None,
        }
    }
}

impl KnowledgeBaseConfig {
    pub fn active_policy(&self) -> PollPolicy {
        PollPolicy::from_secs(self.active_poll_interval_secs, self.active_timeout_secs)
    }

    /// Foundation model ARN of the embedding model in `region`
    pub fn embedding_model_arn(&self, region: &str) -> String {
        format!(
            "arn:aws:bedrock:{}::foundation-model/{}",
            region, self.embedding_model_id
        )
    }
}

/// Whole minutes as a duration, saturating instead of overflowing
pub fn minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

impl IngestionConfig {
    pub fn timeout(&self) -> Duration {
        minutes(self.timeout_minutes)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_values() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.knowledge_base.role_arn.is_none());
        assert_eq!(config.knowledge_base.embedding_dimensions, 1024);
        assert_eq!(config.ingestion.timeout(), Duration::from_secs(1800));
        assert_eq!(config.ingestion.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.storage.primary.create_settle_secs, 60);
        assert!(config.storage.fallback.enabled);
        assert_eq!(
            config.output.result_path,
            "/opt/ml/processing/output/kb_output.json"
        );
    }

    #[test]
    fn test_oversized_ingestion_timeout_saturates() {
        let config = IngestionConfig {
            timeout_minutes: u64::MAX,
            ..IngestionConfig::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(u64::MAX));
        assert_eq!(minutes(2), Duration::from_secs(120));
    }

    #[test]
    fn test_embedding_model_arn() {
        let config = KnowledgeBaseConfig::default();
        assert_eq!(
            config.embedding_model_arn("eu-west-1"),
            "arn:aws:bedrock:eu-west-1::foundation-model/amazon.titan-embed-text-v2:0"
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [knowledge_base]
                role_arn = "arn:aws:iam::123456789012:role/kb"

                [storage.fallback]
                enabled = false
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(
            config.knowledge_base.role_arn.as_deref(),
            Some("arn:aws:iam::123456789012:role/kb")
        );
        assert_eq!(config.knowledge_base.active_timeout_secs, 300);
        assert!(!config.storage.fallback.enabled);
        assert_eq!(config.storage.fallback.index_settle_secs, 30);
    }
}
