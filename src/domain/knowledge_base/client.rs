//! Client trait for the managed knowledge base service

use std::fmt::Debug;

use async_trait::async_trait;

use super::data_source::{CreateDataSourceRequest, DataSourceRecord, DataSourceSummary};
use super::entity::{CreateKnowledgeBaseRequest, KnowledgeBaseRecord, KnowledgeBaseSummary};
use crate::domain::agent::AgentSummary;
use crate::domain::ingestion::IngestionJob;
use crate::domain::DomainError;

/// Knowledge base, data source, ingestion and agent operations
///
/// `get_*` lookups return `DomainError::NotFound` for absent resources;
/// `find_*` lookups scan a listing and return `None` instead.
#[async_trait]
pub trait KnowledgeBaseClient: Send + Sync + Debug {
    async fn find_knowledge_base(
        &self,
        name: &str,
    ) -> Result<Option<KnowledgeBaseSummary>, DomainError>;

    async fn get_knowledge_base(&self, id: &str) -> Result<KnowledgeBaseRecord, DomainError>;

    async fn create_knowledge_base(
        &self,
        request: &CreateKnowledgeBaseRequest,
    ) -> Result<KnowledgeBaseRecord, DomainError>;

    async fn list_data_sources(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<DataSourceSummary>, DomainError>;

    async fn get_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSourceRecord, DomainError>;

    async fn create_data_source(
        &self,
        request: &CreateDataSourceRequest,
    ) -> Result<DataSourceRecord, DomainError>;

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        description: &str,
    ) -> Result<IngestionJob, DomainError>;

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> Result<IngestionJob, DomainError>;

    async fn find_agent(&self, name: &str) -> Result<Option<AgentSummary>, DomainError>;

    /// Associate a knowledge base with the draft version of an agent
    async fn associate_knowledge_base(
        &self,
        agent_id: &str,
        knowledge_base_id: &str,
        description: &str,
    ) -> Result<(), DomainError>;
}
