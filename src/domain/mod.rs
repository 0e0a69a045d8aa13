//! Domain layer - Core provisioning logic and entities

pub mod agent;
pub mod error;
pub mod ingestion;
pub mod knowledge_base;
pub mod polling;
pub mod provisioning;
pub mod resource;
pub mod vector_storage;

pub use agent::{AgentSummary, DRAFT_AGENT_VERSION};
pub use error::DomainError;
pub use ingestion::{IngestionJob, IngestionJobStatus, IngestionStatistics};
pub use knowledge_base::{
    ChunkingPolicy, CreateDataSourceRequest, CreateKnowledgeBaseRequest, DataSourceRecord,
    DataSourceSummary, EmbeddingSettings, KnowledgeBaseClient, KnowledgeBaseDetails,
    KnowledgeBaseRecord, KnowledgeBaseStatus, KnowledgeBaseSummary,
    KnowledgeBaseValidationError, ResourceNames, SourceLocation,
};
pub use polling::{poll_until, settle, PollError, PollPolicy, PollStatus};
pub use provisioning::{
    IngestionOutcome, IngestionOutcomeStatus, OverallStatus, ProvisionRequest,
    ProvisioningFailure, ProvisioningResult,
};
pub use resource::{ensure_created, find_existing, Ensured, Presence, ResourceKind};
pub use vector_storage::{
    BackendKind, CollectionStatus, DistanceMetric, PolicyDocument, SearchCollection,
    SearchCollectionClient, SearchIndexSpec, SecurityPolicyKind, StorageBackend, VectorBucket,
    VectorBucketClient, VectorDataType, VectorIndex, VectorIndexSpec, VectorStorageHandle,
};
