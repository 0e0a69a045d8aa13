//! Knowledge base records as observed from the managed service

use std::fmt;

use serde::{Deserialize, Serialize};

use super::data_source::DataSourceRecord;
use crate::domain::polling::PollStatus;
use crate::domain::vector_storage::VectorStorageHandle;

/// Lifecycle status of a knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum KnowledgeBaseStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Failed,
    Unknown(String),
}

impl KnowledgeBaseStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "CREATING" => Self::Creating,
            "ACTIVE" => Self::Active,
            "UPDATING" => Self::Updating,
            "DELETING" => Self::Deleting,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for KnowledgeBaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => write!(f, "CREATING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Updating => write!(f, "UPDATING"),
            Self::Deleting => write!(f, "DELETING"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unknown(value) => write!(f, "{}", value),
        }
    }
}

impl From<String> for KnowledgeBaseStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<KnowledgeBaseStatus> for String {
    fn from(status: KnowledgeBaseStatus) -> Self {
        status.to_string()
    }
}

impl PollStatus for KnowledgeBaseStatus {
    fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// Entry returned when listing knowledge bases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseSummary {
    pub id: String,
    pub name: String,
    pub status: KnowledgeBaseStatus,
}

/// Embedding model the knowledge base vectorizes documents with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Foundation model ARN (e.g. Titan Text Embeddings v2)
    pub model_arn: String,
    /// Embedding dimensions
    pub dimensions: u32,
}

impl EmbeddingSettings {
    pub fn new(model_arn: impl Into<String>, dimensions: u32) -> Self {
        Self {
            model_arn: model_arn.into(),
            dimensions,
        }
    }
}

/// Managed knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseRecord {
    pub id: String,
    pub name: String,
    pub arn: String,
    pub status: KnowledgeBaseStatus,
    pub role_arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model_arn: Option<String>,
    /// Storage bound at creation; `None` for storage types this crate does not manage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<VectorStorageHandle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_reasons: Vec<String>,
}

/// Request to create a knowledge base bound to one vector storage handle
#[derive(Debug, Clone)]
pub struct CreateKnowledgeBaseRequest {
    pub name: String,
    pub description: String,
    pub role_arn: String,
    pub embedding: EmbeddingSettings,
    pub storage: VectorStorageHandle,
}

/// Knowledge base together with its data sources
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeBaseDetails {
    pub knowledge_base: KnowledgeBaseRecord,
    pub data_sources: Vec<DataSourceRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        for raw in ["CREATING", "ACTIVE", "UPDATING", "DELETING", "FAILED"] {
            let status = KnowledgeBaseStatus::parse(raw);
            assert!(status.is_recognized());
            assert_eq!(status.to_string(), raw);
        }
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status = KnowledgeBaseStatus::parse("DELETE_UNSUCCESSFUL");
        assert_eq!(
            status,
            KnowledgeBaseStatus::Unknown("DELETE_UNSUCCESSFUL".to_string())
        );
        assert!(!status.is_recognized());
    }

    #[test]
    fn test_status_serializes_as_service_string() {
        let json = serde_json::to_string(&KnowledgeBaseStatus::Active).unwrap();
        assert_eq!(json, "\"ACTIVE\"");

        let parsed: KnowledgeBaseStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, KnowledgeBaseStatus::Failed);
    }
}
