//! Vector storage handles and the records of the resources behind them

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::polling::PollStatus;

/// Which vector storage backend a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// S3 Vectors bucket + index
    PrimaryBucketIndex,
    /// OpenSearch Serverless vector search collection
    FallbackSearchCollection,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryBucketIndex => write!(f, "primary_bucket_index"),
            Self::FallbackSearchCollection => write!(f, "fallback_search_collection"),
        }
    }
}

/// A provisioned vector storage instance a knowledge base can bind to
///
/// Immutable once returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStorageHandle {
    backend_kind: BackendKind,
    /// Index ARN (primary) or collection ARN (fallback)
    resource_arn: String,
    /// Vector bucket ARN, primary only
    #[serde(skip_serializing_if = "Option::is_none")]
    container_arn: Option<String>,
    index_name: String,
    /// Collection endpoint, fallback only
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
}

impl VectorStorageHandle {
    /// Handle for an S3 Vectors index inside a vector bucket
    pub fn bucket_index(
        bucket_arn: impl Into<String>,
        index_arn: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            backend_kind: BackendKind::PrimaryBucketIndex,
            resource_arn: index_arn.into(),
            container_arn: Some(bucket_arn.into()),
            index_name: index_name.into(),
            endpoint: None,
        }
    }

    /// Handle for a vector index inside an OpenSearch Serverless collection
    pub fn search_collection(
        collection_arn: impl Into<String>,
        index_name: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        Self {
            backend_kind: BackendKind::FallbackSearchCollection,
            resource_arn: collection_arn.into(),
            container_arn: None,
            index_name: index_name.into(),
            endpoint,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub fn resource_arn(&self) -> &str {
        &self.resource_arn
    }

    pub fn container_arn(&self) -> Option<&str> {
        self.container_arn.as_deref()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

/// S3 Vectors bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorBucket {
    pub name: String,
    pub arn: String,
}

/// S3 Vectors index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorIndex {
    pub name: String,
    pub arn: String,
}

/// Distance metric for a vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

/// Element type stored in a vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorDataType {
    #[default]
    Float32,
}

/// Parameters for creating an S3 Vectors index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorIndexSpec {
    pub name: String,
    pub dimension: u32,
    pub distance_metric: DistanceMetric,
    pub data_type: VectorDataType,
}

/// OpenSearch Serverless security policy flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityPolicyKind {
    Encryption,
    Network,
}

impl fmt::Display for SecurityPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encryption => write!(f, "encryption"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A named policy document (security or data access)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    pub name: String,
    pub policy: serde_json::Value,
}

/// Lifecycle status of a search collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionStatus {
    Creating,
    Active,
    Deleting,
    Failed,
    Unknown(String),
}

impl CollectionStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "CREATING" => Self::Creating,
            "ACTIVE" => Self::Active,
            "DELETING" => Self::Deleting,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => write!(f, "CREATING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Deleting => write!(f, "DELETING"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unknown(value) => write!(f, "{}", value),
        }
    }
}

impl PollStatus for CollectionStatus {
    fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// OpenSearch Serverless vector search collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCollection {
    pub id: String,
    pub name: String,
    pub arn: String,
    pub endpoint: Option<String>,
    pub status: CollectionStatus,
}

/// Parameters for creating a knn vector index inside a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndexSpec {
    pub name: String,
    pub dimension: u32,
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
}

impl SearchIndexSpec {
    /// Index body for the collection data plane
    pub fn to_mapping(&self) -> serde_json::Value {
        serde_json::json!({
            "settings": {
                "index": {
                    "knn": true,
                    "knn.algo_param.ef_search": 512
                }
            },
            "mappings": {
                "properties": {
                    self.vector_field.clone(): {
                        "type": "knn_vector",
                        "dimension": self.dimension,
                        "method": {
                            "name": "hnsw",
                            "engine": "faiss",
                            "space_type": "l2",
                            "parameters": {
                                "ef_construction": 512,
                                "m": 16
                            }
                        }
                    },
                    self.text_field.clone(): {
                        "type": "text",
                        "index": true
                    },
                    self.metadata_field.clone(): {
                        "type": "text",
                        "index": false
                    }
                }
            }
        })
    }
}
