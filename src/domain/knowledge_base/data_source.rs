//! Data sources: where a knowledge base reads documents from and how it chunks them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation::KnowledgeBaseValidationError;
use crate::domain::DomainError;

const S3_SCHEME: &str = "s3://";

/// Object storage location of the source documents (`s3://bucket/prefix`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    bucket: String,
    prefix: String,
}

impl SourceLocation {
    pub fn parse(uri: &str) -> Result<Self, KnowledgeBaseValidationError> {
        let invalid = || KnowledgeBaseValidationError::InvalidSourceUri {
            uri: uri.to_string(),
        };

        let rest = uri.strip_prefix(S3_SCHEME).ok_or_else(invalid)?;
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn bucket_arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.bucket)
    }

    /// Inclusion prefixes for the data source; empty when the whole bucket is used
    pub fn inclusion_prefixes(&self) -> Vec<String> {
        if self.prefix.is_empty() {
            Vec::new()
        } else {
            vec![self.prefix.clone()]
        }
    }
}

impl FromStr for SourceLocation {
    type Err = KnowledgeBaseValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}{}", S3_SCHEME, self.bucket)
        } else {
            write!(f, "{}{}/{}", S3_SCHEME, self.bucket, self.prefix)
        }
    }
}

pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_OVERLAP_PERCENTAGE: u32 = 20;

/// Fixed-size chunking applied when documents are ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ChunkingPolicy {
    #[validate(range(min = 1, max = 8192))]
    pub max_tokens: u32,
    #[validate(range(min = 1, max = 99))]
    pub overlap_percentage: u32,
}

impl ChunkingPolicy {
    /// Build a policy from explicit values, rejecting out-of-range ones
    pub fn new(max_tokens: u32, overlap_percentage: u32) -> Result<Self, DomainError> {
        let policy = Self {
            max_tokens,
            overlap_percentage,
        };
        policy
            .validate()
            .map_err(|e| DomainError::validation(format!("Invalid chunking policy: {}", e)))?;
        Ok(policy)
    }
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap_percentage: DEFAULT_OVERLAP_PERCENTAGE,
        }
    }
}

/// Entry returned when listing a knowledge base's data sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceSummary {
    pub id: String,
    pub name: String,
}

/// Full data source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceRecord {
    pub id: String,
    pub knowledge_base_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_uri: Option<String>,
    /// `None` when the service applies its default chunking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_policy: Option<ChunkingPolicy>,
}

#[derive(Debug, Clone)]
pub struct CreateDataSourceRequest {
    pub knowledge_base_id: String,
    pub name: String,
    pub description: String,
    pub location: SourceLocation,
    pub chunking: ChunkingPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_location() {
        let location = SourceLocation::parse("s3://docs-bucket/agents/support/").unwrap();

        assert_eq!(location.bucket(), "docs-bucket");
        assert_eq!(location.prefix(), "agents/support/");
        assert_eq!(location.bucket_arn(), "arn:aws:s3:::docs-bucket");
        assert_eq!(location.inclusion_prefixes(), vec!["agents/support/"]);
        assert_eq!(location.to_string(), "s3://docs-bucket/agents/support/");
    }

    #[test]
    fn test_parse_bucket_only() {
        let location: SourceLocation = "s3://docs-bucket".parse().unwrap();

        assert_eq!(location.prefix(), "");
        assert!(location.inclusion_prefixes().is_empty());
        assert_eq!(location.to_string(), "s3://docs-bucket");
    }

    #[test]
    fn test_reject_invalid_locations() {
        for uri in ["https://docs-bucket/x", "s3://", "s3:///prefix", "docs-bucket"] {
            assert!(
                matches!(
                    SourceLocation::parse(uri),
                    Err(KnowledgeBaseValidationError::InvalidSourceUri { .. })
                ),
                "{} should be rejected",
                uri
            );
        }
    }

    #[test]
    fn test_chunking_defaults() {
        let policy = ChunkingPolicy::default();
        assert_eq!(policy.max_tokens, 1024);
        assert_eq!(policy.overlap_percentage, 20);
    }

    #[test]
    fn test_chunking_explicit_values_kept() {
        let policy = ChunkingPolicy::new(300, 10).unwrap();
        assert_eq!(policy.max_tokens, 300);
        assert_eq!(policy.overlap_percentage, 10);
    }

    #[test]
    fn test_chunking_out_of_range() {
        assert!(ChunkingPolicy::new(0, 20).is_err());
        assert!(ChunkingPolicy::new(1024, 0).is_err());
        assert!(ChunkingPolicy::new(1024, 100).is_err());
        assert!(ChunkingPolicy::new(9000, 20).is_err());
    }
}
