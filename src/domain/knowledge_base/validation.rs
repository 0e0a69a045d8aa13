//! Knowledge base validation utilities

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::DomainError;

/// Maximum length for agent names
pub const MAX_AGENT_NAME_LENGTH: usize = 100;

/// Regex pattern for valid agent names (alphanumeric, hyphens, underscores)
static AGENT_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").expect("agent name pattern is valid")
});

/// Knowledge base validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeBaseValidationError {
    /// Agent name is empty
    EmptyAgentName,
    /// Agent name exceeds maximum length
    AgentNameTooLong { length: usize, max: usize },
    /// Agent name contains invalid characters
    InvalidAgentName { name: String },
    /// Invalid embedding dimensions
    InvalidDimensions { value: u32, min: u32, max: u32 },
    /// Source location is not an `s3://bucket/prefix` URI
    InvalidSourceUri { uri: String },
}

impl fmt::Display for KnowledgeBaseValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAgentName => write!(f, "Agent name cannot be empty"),
            Self::AgentNameTooLong { length, max } => {
                write!(
                    f,
                    "Agent name too long: {} characters (max {})",
                    length, max
                )
            }
            Self::InvalidAgentName { name } => {
                write!(
                    f,
                    "Invalid agent name '{}': must be alphanumeric with hyphens or underscores",
                    name
                )
            }
            Self::InvalidDimensions { value, min, max } => {
                write!(
                    f,
                    "Invalid embedding dimensions {}: must be between {} and {}",
                    value, min, max
                )
            }
            Self::InvalidSourceUri { uri } => {
                write!(
                    f,
                    "Invalid source URI '{}': expected s3://bucket/prefix",
                    uri
                )
            }
        }
    }
}

impl std::error::Error for KnowledgeBaseValidationError {}

impl From<KnowledgeBaseValidationError> for DomainError {
    fn from(error: KnowledgeBaseValidationError) -> Self {
        DomainError::validation(error.to_string())
    }
}

/// Validate an agent name
pub fn validate_agent_name(name: &str) -> Result<(), KnowledgeBaseValidationError> {
    if name.is_empty() {
        return Err(KnowledgeBaseValidationError::EmptyAgentName);
    }

    if name.len() > MAX_AGENT_NAME_LENGTH {
        return Err(KnowledgeBaseValidationError::AgentNameTooLong {
            length: name.len(),
            max: MAX_AGENT_NAME_LENGTH,
        });
    }

    if !AGENT_NAME_PATTERN.is_match(name) {
        return Err(KnowledgeBaseValidationError::InvalidAgentName {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// Validate embedding dimensions
pub fn validate_dimensions(dims: u32) -> Result<(), KnowledgeBaseValidationError> {
    const MIN: u32 = 1;
    const MAX: u32 = 4096;

    if !(MIN..=MAX).contains(&dims) {
        return Err(KnowledgeBaseValidationError::InvalidDimensions {
            value: dims,
            min: MIN,
            max: MAX,
        });
    }

    Ok(())
}
