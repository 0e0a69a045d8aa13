//! Knowledge base domain - knowledge bases, data sources and resource naming

mod client;
mod data_source;
mod entity;
mod names;
mod validation;

pub use client::KnowledgeBaseClient;
pub use data_source::{
    ChunkingPolicy, CreateDataSourceRequest, DataSourceRecord, DataSourceSummary, SourceLocation,
    DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_PERCENTAGE,
};
pub use entity::{
    CreateKnowledgeBaseRequest, EmbeddingSettings, KnowledgeBaseDetails, KnowledgeBaseRecord,
    KnowledgeBaseStatus, KnowledgeBaseSummary,
};
pub use names::ResourceNames;
pub use validation::{
    validate_agent_name, validate_dimensions, KnowledgeBaseValidationError, MAX_AGENT_NAME_LENGTH,
};

#[cfg(test)]
pub use client::mock::MockKnowledgeBaseClient;
