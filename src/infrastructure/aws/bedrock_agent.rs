//! Bedrock Agent adapter: knowledge bases, data sources, ingestion jobs and agents

use std::fmt;

use async_trait::async_trait;
use aws_sdk_bedrockagent::types::{
    self as sdk, BedrockEmbeddingModelConfiguration, ChunkingConfiguration, ChunkingStrategy,
    DataSourceConfiguration, DataSourceType, EmbeddingDataType, EmbeddingModelConfiguration,
    FixedSizeChunkingConfiguration, KnowledgeBaseConfiguration, KnowledgeBaseState,
    KnowledgeBaseStorageType, KnowledgeBaseType, OpenSearchServerlessConfiguration,
    OpenSearchServerlessFieldMapping, S3DataSourceConfiguration, S3VectorsConfiguration,
    StorageConfiguration, VectorIngestionConfiguration, VectorKnowledgeBaseConfiguration,
};
use aws_sdk_bedrockagent::Client;
use tracing::debug;

use super::context::AwsContext;
use super::error::{build_error, classify_sdk_error, missing_field};
use crate::domain::knowledge_base::{
    ChunkingPolicy, CreateDataSourceRequest, CreateKnowledgeBaseRequest, DataSourceRecord,
    DataSourceSummary, KnowledgeBaseClient, KnowledgeBaseRecord, KnowledgeBaseStatus,
    KnowledgeBaseSummary,
};
use crate::domain::ingestion::{IngestionJob, IngestionJobStatus, IngestionStatistics};
use crate::domain::vector_storage::{BackendKind, VectorStorageHandle};
use crate::domain::{AgentSummary, DomainError, DRAFT_AGENT_VERSION};

const SERVICE: &str = "bedrock-agent";
const PAGE_SIZE: i32 = 100;

/// Field names a knowledge base maps onto a search collection index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFieldMapping {
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
}

/// `KnowledgeBaseClient` backed by the Bedrock Agent control plane
pub struct BedrockAgentClient {
    client: Client,
    field_mapping: SearchFieldMapping,
}

impl fmt::Debug for BedrockAgentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BedrockAgentClient")
            .field("field_mapping", &self.field_mapping)
            .finish()
    }
}

impl BedrockAgentClient {
    pub fn new(context: &AwsContext, field_mapping: SearchFieldMapping) -> Self {
        Self {
            client: Client::new(context.sdk_config()),
            field_mapping,
        }
    }

    fn storage_configuration(
        &self,
        storage: &VectorStorageHandle,
    ) -> Result<StorageConfiguration, DomainError> {
        let builder = match storage.backend_kind() {
            BackendKind::PrimaryBucketIndex => StorageConfiguration::builder()
                .r#type(KnowledgeBaseStorageType::S3Vectors)
                .s3_vectors_configuration(
                    S3VectorsConfiguration::builder()
                        .set_vector_bucket_arn(storage.container_arn().map(str::to_string))
                        .index_arn(storage.resource_arn())
                        .build(),
                ),
            BackendKind::FallbackSearchCollection => {
                let mapping = OpenSearchServerlessFieldMapping::builder()
                    .vector_field(&self.field_mapping.vector_field)
                    .text_field(&self.field_mapping.text_field)
                    .metadata_field(&self.field_mapping.metadata_field)
                    .build()
                    .map_err(|e| build_error(SERVICE, "field mapping", e))?;
                StorageConfiguration::builder()
                    .r#type(KnowledgeBaseStorageType::OpensearchServerless)
                    .opensearch_serverless_configuration(
                        OpenSearchServerlessConfiguration::builder()
                            .collection_arn(storage.resource_arn())
                            .vector_index_name(storage.index_name())
                            .field_mapping(mapping)
                            .build()
                            .map_err(|e| build_error(SERVICE, "collection storage", e))?,
                    )
            }
        };

        builder
            .build()
            .map_err(|e| build_error(SERVICE, "storage configuration", e))
    }
}

#[async_trait]
impl KnowledgeBaseClient for BedrockAgentClient {
    async fn find_knowledge_base(
        &self,
        name: &str,
    ) -> Result<Option<KnowledgeBaseSummary>, DomainError> {
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_knowledge_bases()
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(SERVICE, "ListKnowledgeBases", e))?;

            if let Some(found) = page
                .knowledge_base_summaries()
                .iter()
                .find(|summary| summary.name() == name)
            {
                return Ok(Some(KnowledgeBaseSummary {
                    id: found.knowledge_base_id().to_string(),
                    name: found.name().to_string(),
                    status: KnowledgeBaseStatus::parse(found.status().as_str()),
                }));
            }

            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    async fn get_knowledge_base(&self, id: &str) -> Result<KnowledgeBaseRecord, DomainError> {
        let response = self
            .client
            .get_knowledge_base()
            .knowledge_base_id(id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "GetKnowledgeBase", e))?;

        response
            .knowledge_base()
            .map(knowledge_base_record)
            .ok_or_else(|| missing_field(SERVICE, "GetKnowledgeBase", "knowledgeBase"))
    }

    async fn create_knowledge_base(
        &self,
        request: &CreateKnowledgeBaseRequest,
    ) -> Result<KnowledgeBaseRecord, DomainError> {
        let embedding = EmbeddingModelConfiguration::builder()
            .bedrock_embedding_model_configuration(
                BedrockEmbeddingModelConfiguration::builder()
                    .dimensions(to_i32(request.embedding.dimensions, "dimensions")?)
                    .embedding_data_type(EmbeddingDataType::Float32)
                    .build(),
            )
            .build();

        let configuration = KnowledgeBaseConfiguration::builder()
            .r#type(KnowledgeBaseType::Vector)
            .vector_knowledge_base_configuration(
                VectorKnowledgeBaseConfiguration::builder()
                    .embedding_model_arn(&request.embedding.model_arn)
                    .embedding_model_configuration(embedding)
                    .build()
                    .map_err(|e| build_error(SERVICE, "vector configuration", e))?,
            )
            .build()
            .map_err(|e| build_error(SERVICE, "knowledge base configuration", e))?;

        debug!(
            name = %request.name,
            backend = %request.storage.backend_kind(),
            "Creating knowledge base"
        );

        let response = self
            .client
            .create_knowledge_base()
            .name(&request.name)
            .description(&request.description)
            .role_arn(&request.role_arn)
            .knowledge_base_configuration(configuration)
            .storage_configuration(self.storage_configuration(&request.storage)?)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "CreateKnowledgeBase", e))?;

        response
            .knowledge_base()
            .map(knowledge_base_record)
            .ok_or_else(|| missing_field(SERVICE, "CreateKnowledgeBase", "knowledgeBase"))
    }

    async fn list_data_sources(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<DataSourceSummary>, DomainError> {
        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_data_sources()
                .knowledge_base_id(knowledge_base_id)
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(SERVICE, "ListDataSources", e))?;

            summaries.extend(page.data_source_summaries().iter().map(|summary| {
                DataSourceSummary {
                    id: summary.data_source_id().to_string(),
                    name: summary.name().to_string(),
                }
            }));

            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(summaries),
            }
        }
    }

    async fn get_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSourceRecord, DomainError> {
        let response = self
            .client
            .get_data_source()
            .knowledge_base_id(knowledge_base_id)
            .data_source_id(data_source_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "GetDataSource", e))?;

        response
            .data_source()
            .map(data_source_record)
            .ok_or_else(|| missing_field(SERVICE, "GetDataSource", "dataSource"))
    }

    async fn create_data_source(
        &self,
        request: &CreateDataSourceRequest,
    ) -> Result<DataSourceRecord, DomainError> {
        let prefixes = request.location.inclusion_prefixes();
        let s3 = S3DataSourceConfiguration::builder()
            .bucket_arn(request.location.bucket_arn())
            .set_inclusion_prefixes((!prefixes.is_empty()).then_some(prefixes))
            .build()
            .map_err(|e| build_error(SERVICE, "S3 data source", e))?;

        let source = DataSourceConfiguration::builder()
            .r#type(DataSourceType::S3)
            .s3_configuration(s3)
            .build()
            .map_err(|e| build_error(SERVICE, "data source configuration", e))?;

        let fixed_size = FixedSizeChunkingConfiguration::builder()
            .max_tokens(to_i32(request.chunking.max_tokens, "maxTokens")?)
            .overlap_percentage(to_i32(
                request.chunking.overlap_percentage,
                "overlapPercentage",
            )?)
            .build()
            .map_err(|e| build_error(SERVICE, "fixed size chunking", e))?;

        let chunking = ChunkingConfiguration::builder()
            .chunking_strategy(ChunkingStrategy::FixedSize)
            .fixed_size_chunking_configuration(fixed_size)
            .build()
            .map_err(|e| build_error(SERVICE, "chunking configuration", e))?;

        let response = self
            .client
            .create_data_source()
            .knowledge_base_id(&request.knowledge_base_id)
            .name(&request.name)
            .description(&request.description)
            .data_source_configuration(source)
            .vector_ingestion_configuration(
                VectorIngestionConfiguration::builder()
                    .chunking_configuration(chunking)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "CreateDataSource", e))?;

        response
            .data_source()
            .map(data_source_record)
            .ok_or_else(|| missing_field(SERVICE, "CreateDataSource", "dataSource"))
    }

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        description: &str,
    ) -> Result<IngestionJob, DomainError> {
        let response = self
            .client
            .start_ingestion_job()
            .knowledge_base_id(knowledge_base_id)
            .data_source_id(data_source_id)
            .description(description)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "StartIngestionJob", e))?;

        response
            .ingestion_job()
            .map(ingestion_job)
            .ok_or_else(|| missing_field(SERVICE, "StartIngestionJob", "ingestionJob"))
    }

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        job_id: &str,
    ) -> Result<IngestionJob, DomainError> {
        let response = self
            .client
            .get_ingestion_job()
            .knowledge_base_id(knowledge_base_id)
            .data_source_id(data_source_id)
            .ingestion_job_id(job_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "GetIngestionJob", e))?;

        response
            .ingestion_job()
            .map(ingestion_job)
            .ok_or_else(|| missing_field(SERVICE, "GetIngestionJob", "ingestionJob"))
    }

    async fn find_agent(&self, name: &str) -> Result<Option<AgentSummary>, DomainError> {
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_agents()
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(SERVICE, "ListAgents", e))?;

            if let Some(agent) = page
                .agent_summaries()
                .iter()
                .find(|agent| agent.agent_name() == name)
            {
                return Ok(Some(AgentSummary {
                    id: agent.agent_id().to_string(),
                    name: agent.agent_name().to_string(),
                    status: agent.agent_status().as_str().to_string(),
                }));
            }

            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    async fn associate_knowledge_base(
        &self,
        agent_id: &str,
        knowledge_base_id: &str,
        description: &str,
    ) -> Result<(), DomainError> {
        self.client
            .associate_agent_knowledge_base()
            .agent_id(agent_id)
            .agent_version(DRAFT_AGENT_VERSION)
            .knowledge_base_id(knowledge_base_id)
            .description(description)
            .knowledge_base_state(KnowledgeBaseState::Enabled)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "AssociateAgentKnowledgeBase", e))?;
        Ok(())
    }
}

fn to_i32(value: u32, field: &str) -> Result<i32, DomainError> {
    i32::try_from(value)
        .map_err(|_| DomainError::validation(format!("{} {} is out of range", field, value)))
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn knowledge_base_record(kb: &sdk::KnowledgeBase) -> KnowledgeBaseRecord {
    KnowledgeBaseRecord {
        id: kb.knowledge_base_id().to_string(),
        name: kb.name().to_string(),
        arn: kb.knowledge_base_arn().to_string(),
        status: KnowledgeBaseStatus::parse(kb.status().as_str()),
        role_arn: kb.role_arn().to_string(),
        embedding_model_arn: kb
            .knowledge_base_configuration()
            .and_then(|config| config.vector_knowledge_base_configuration())
            .map(|vector| vector.embedding_model_arn().to_string()),
        storage: kb.storage_configuration().and_then(storage_handle),
        failure_reasons: kb.failure_reasons().to_vec(),
    }
}

fn storage_handle(storage: &StorageConfiguration) -> Option<VectorStorageHandle> {
    match storage.r#type() {
        KnowledgeBaseStorageType::S3Vectors => {
            let config = storage.s3_vectors_configuration()?;
            let index_arn = config.index_arn()?;
            let index_name = config
                .index_name()
                .or_else(|| index_arn.rsplit_once("/index/").map(|(_, name)| name))
                .unwrap_or_default();
            Some(VectorStorageHandle::bucket_index(
                config.vector_bucket_arn().unwrap_or_default(),
                index_arn,
                index_name,
            ))
        }
        KnowledgeBaseStorageType::OpensearchServerless => {
            let config = storage.opensearch_serverless_configuration()?;
            Some(VectorStorageHandle::search_collection(
                config.collection_arn(),
                config.vector_index_name(),
                None,
            ))
        }
        _ => None,
    }
}

fn data_source_record(source: &sdk::DataSource) -> DataSourceRecord {
    let location_uri = source
        .data_source_configuration()
        .and_then(|config| config.s3_configuration())
        .map(|s3| s3_uri(s3.bucket_arn(), s3.inclusion_prefixes()));

    let chunking_policy = source
        .vector_ingestion_configuration()
        .and_then(|config| config.chunking_configuration())
        .and_then(|chunking| chunking.fixed_size_chunking_configuration())
        .map(|fixed| ChunkingPolicy {
            max_tokens: u32::try_from(fixed.max_tokens()).unwrap_or(0),
            overlap_percentage: u32::try_from(fixed.overlap_percentage()).unwrap_or(0),
        });

    DataSourceRecord {
        id: source.data_source_id().to_string(),
        knowledge_base_id: source.knowledge_base_id().to_string(),
        name: source.name().to_string(),
        location_uri,
        chunking_policy,
    }
}

/// `s3://bucket[/prefix]` from a bucket ARN and the first inclusion prefix
fn s3_uri(bucket_arn: &str, prefixes: &[String]) -> String {
    let bucket = bucket_arn.strip_prefix("arn:aws:s3:::").unwrap_or(bucket_arn);
    match prefixes.first() {
        Some(prefix) => format!("s3://{}/{}", bucket, prefix),
        None => format!("s3://{}", bucket),
    }
}

fn ingestion_job(job: &sdk::IngestionJob) -> IngestionJob {
    IngestionJob {
        id: job.ingestion_job_id().to_string(),
        knowledge_base_id: job.knowledge_base_id().to_string(),
        data_source_id: job.data_source_id().to_string(),
        status: IngestionJobStatus::parse(job.status().as_str()),
        statistics: job.statistics().map(statistics).unwrap_or_default(),
        failure_reasons: job.failure_reasons().to_vec(),
    }
}

/// The service reports document counts only; the chunk counters carry the
/// per-document change counts
fn statistics(stats: &sdk::IngestionJobStatistics) -> IngestionStatistics {
    let new = count(stats.number_of_new_documents_indexed());
    let modified = count(stats.number_of_modified_documents_indexed());
    IngestionStatistics {
        documents_scanned: count(stats.number_of_documents_scanned()),
        documents_indexed: new + modified,
        documents_failed: count(stats.number_of_documents_failed()),
        chunks_new: new,
        chunks_modified: modified,
        chunks_deleted: count(stats.number_of_documents_deleted()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_mapping() {
        let stats = sdk::IngestionJobStatistics::builder()
            .number_of_documents_scanned(12)
            .number_of_new_documents_indexed(8)
            .number_of_modified_documents_indexed(2)
            .number_of_documents_deleted(1)
            .number_of_documents_failed(2)
            .build();

        let mapped = statistics(&stats);

        assert_eq!(mapped.documents_scanned, 12);
        assert_eq!(mapped.documents_indexed, 10);
        assert_eq!(mapped.documents_failed, 2);
        assert_eq!(mapped.chunks_new, 8);
        assert_eq!(mapped.chunks_modified, 2);
        assert_eq!(mapped.chunks_deleted, 1);
    }

    #[test]
    fn test_s3_uri_from_bucket_arn() {
        assert_eq!(
            s3_uri("arn:aws:s3:::docs", &["agents/support/".to_string()]),
            "s3://docs/agents/support/"
        );
        assert_eq!(s3_uri("arn:aws:s3:::docs", &[]), "s3://docs");
    }

    #[test]
    fn test_negative_counts_clamp_to_zero() {
        assert_eq!(count(-1), 0);
        assert_eq!(count(7), 7);
    }

    #[test]
    fn test_dimension_conversion() {
        assert_eq!(to_i32(1024, "dimensions").unwrap(), 1024);
        assert!(to_i32(u32::MAX, "dimensions").is_err());
    }
}
