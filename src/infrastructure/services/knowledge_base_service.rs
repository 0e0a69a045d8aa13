//! Knowledge base provisioning service
//!
//! Drives one provisioning run end to end: vector storage, knowledge base,
//! data source, ingestion and agent association. Setup failures abort the run
//! with an `error` result; ingestion and association failures are recorded in
//! the result and the run still completes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{error, info, instrument, warn};

use super::ingestion_service::IngestionRunner;
use super::storage_service::{
    provision_with_fallback, BucketBackendSettings, CollectionBackendSettings, CollectionNames,
    SearchCollectionBackend, VectorBucketBackend,
};
use crate::domain::knowledge_base::{
    CreateDataSourceRequest, CreateKnowledgeBaseRequest, EmbeddingSettings, KnowledgeBaseClient,
    KnowledgeBaseDetails, KnowledgeBaseRecord, KnowledgeBaseStatus, ResourceNames,
};
use crate::domain::polling::{poll_until, PollPolicy};
use crate::domain::provisioning::{
    IngestionOutcome, OverallStatus, ProvisionRequest, ProvisioningFailure, ProvisioningResult,
};
use crate::domain::resource::{ensure_created, find_existing, Presence, ResourceKind};
use crate::domain::vector_storage::{
    SearchCollectionClient, StorageBackend, VectorBucketClient, VectorStorageHandle,
};
use crate::domain::DomainError;

/// Vector storage settings for both backends
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    pub bucket: BucketBackendSettings,
    pub collection: CollectionBackendSettings,
    pub fallback_enabled: bool,
    /// Principals granted collection data access besides the role and the caller
    pub extra_principals: Vec<String>,
}

/// Everything the provisioner needs besides its clients
#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
    pub account_id: String,
    /// Identity the run executes as
    pub caller_arn: String,
    /// Service role assumed by new knowledge bases
    pub role_arn: Option<String>,
    pub embedding: EmbeddingSettings,
    /// Wait for a knowledge base to become ACTIVE
    pub kb_active_policy: PollPolicy,
    pub ingestion_poll_interval: Duration,
    pub ingestion_description: String,
    pub association_description: String,
    pub storage: StorageSettings,
}

/// Provisions and maintains the knowledge base of a conversational agent
pub struct KnowledgeBaseProvisioner {
    knowledge_bases: Arc<dyn KnowledgeBaseClient>,
    vector_buckets: Arc<dyn VectorBucketClient>,
    search_collections: Option<Arc<dyn SearchCollectionClient>>,
    settings: ProvisionerSettings,
}

impl fmt::Debug for KnowledgeBaseProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeBaseProvisioner")
            .field("settings", &self.settings)
            .field("fallback_client", &self.search_collections.is_some())
            .finish()
    }
}

impl KnowledgeBaseProvisioner {
    pub fn new(
        knowledge_bases: Arc<dyn KnowledgeBaseClient>,
        vector_buckets: Arc<dyn VectorBucketClient>,
        settings: ProvisionerSettings,
    ) -> Self {
        Self {
            knowledge_bases,
            vector_buckets,
            search_collections: None,
            settings,
        }
    }

    pub fn with_search_collections(mut self, client: Arc<dyn SearchCollectionClient>) -> Self {
        self.search_collections = Some(client);
        self
    }

    /// Run one provisioning pass for the requested agent
    #[instrument(skip(self, request), fields(agent = %request.agent_name))]
    pub async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisioningResult, ProvisioningFailure> {
        let mut result = ProvisioningResult::new(&request.agent_name, request.enabled);

        if !request.enabled {
            info!("Knowledge base provisioning is disabled, skipping");
            counter!("kb_provisioning_runs_total", "status" => "skipped").increment(1);
            return Ok(result.finish());
        }

        info!(
            source = %request.source,
            max_tokens = request.chunking.max_tokens,
            overlap_percentage = request.chunking.overlap_percentage,
            "Provisioning knowledge base"
        );

        let (knowledge_base_id, data_source_id) = match self.setup(request, &mut result).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Knowledge base setup failed");
                counter!("kb_provisioning_runs_total", "status" => "error").increment(1);
                return Err(result.into_failure(e));
            }
        };

        result.ingestion = if request.skip_ingestion {
            info!("Ingestion skipped on request");
            IngestionOutcome::skipped()
        } else {
            self.ingestion_runner()
                .run(&knowledge_base_id, &data_source_id, request.ingestion_timeout)
                .await
        };

        self.associate_agent(&request.agent_name, &knowledge_base_id, &mut result)
            .await;

        let status = match result.status {
            OverallStatus::Created => "created",
            _ => "existing",
        };
        counter!("kb_provisioning_runs_total", "status" => status).increment(1);
        info!(
            knowledge_base_id = %knowledge_base_id,
            data_source_id = %data_source_id,
            status,
            ingestion = ?result.ingestion.status,
            agent_associated = result.agent_associated,
            "Knowledge base provisioning finished"
        );

        Ok(result.finish())
    }

    /// Re-run ingestion for an already provisioned knowledge base
    #[instrument(skip(self))]
    pub async fn sync_documents(
        &self,
        agent_name: &str,
        timeout: Duration,
    ) -> Result<IngestionOutcome, DomainError> {
        let names = self.names(agent_name)?;

        let knowledge_base = self
            .lookup_knowledge_base(&names.knowledge_base)
            .await?
            .into_option()
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "Knowledge base '{}' does not exist",
                    names.knowledge_base
                ))
            })?;

        let data_source = self
            .knowledge_bases
            .list_data_sources(&knowledge_base.id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "Knowledge base '{}' has no data source",
                    names.knowledge_base
                ))
            })?;

        Ok(self
            .ingestion_runner()
            .run(&knowledge_base.id, &data_source.id, timeout)
            .await)
    }

    /// Knowledge base record and data source configuration, if provisioned
    #[instrument(skip(self))]
    pub async fn describe(
        &self,
        agent_name: &str,
    ) -> Result<Option<KnowledgeBaseDetails>, DomainError> {
        let names = self.names(agent_name)?;

        let Presence::Exists(knowledge_base) = self.lookup_knowledge_base(&names.knowledge_base).await?
        else {
            return Ok(None);
        };

        let mut data_sources = Vec::new();
        for summary in self
            .knowledge_bases
            .list_data_sources(&knowledge_base.id)
            .await?
        {
            data_sources.push(
                self.knowledge_bases
                    .get_data_source(&knowledge_base.id, &summary.id)
                    .await?,
            );
        }

        Ok(Some(KnowledgeBaseDetails {
            knowledge_base,
            data_sources,
        }))
    }

    /// Storage, knowledge base and data source; returns their ids
    async fn setup(
        &self,
        request: &ProvisionRequest,
        result: &mut ProvisioningResult,
    ) -> Result<(String, String), DomainError> {
        let names = self.names(&request.agent_name)?;

        let existing = find_existing(ResourceKind::KnowledgeBase, &names.knowledge_base, || {
            self.lookup_knowledge_base(&names.knowledge_base)
        })
        .await?;

        let knowledge_base = match existing {
            Presence::Exists(knowledge_base) => {
                info!(knowledge_base_id = %knowledge_base.id, "Using existing knowledge base");
                result.status = OverallStatus::Existing;
                result.knowledge_base_id = Some(knowledge_base.id.clone());
                self.ensure_active(knowledge_base).await?
            }
            Presence::NotFound => {
                let role_arn = self.role_arn()?;
                let storage = self.provision_storage(&names, &role_arn).await?;
                result.with_storage(&storage);

                let create = CreateKnowledgeBaseRequest {
                    name: names.knowledge_base.clone(),
                    description: format!("Knowledge base for agent {}", request.agent_name),
                    role_arn,
                    embedding: self.settings.embedding.clone(),
                    storage,
                };
                let ensured = ensure_created(
                    ResourceKind::KnowledgeBase,
                    &names.knowledge_base,
                    || self.lookup_knowledge_base(&names.knowledge_base),
                    || self.knowledge_bases.create_knowledge_base(&create),
                )
                .await?;

                result.status = if ensured.created {
                    OverallStatus::Created
                } else {
                    OverallStatus::Existing
                };
                result.knowledge_base_id = Some(ensured.resource.id.clone());
                self.ensure_active(ensured.resource).await?
            }
        };

        if result.storage.is_none() {
            if let Some(storage) = &knowledge_base.storage {
                result.with_storage(storage);
            }
        }

        let data_source_id = self
            .ensure_data_source(&knowledge_base.id, &names, request)
            .await?;
        result.data_source_id = Some(data_source_id.clone());

        Ok((knowledge_base.id, data_source_id))
    }

    async fn provision_storage(
        &self,
        names: &ResourceNames,
        role_arn: &str,
    ) -> Result<VectorStorageHandle, DomainError> {
        let storage = &self.settings.storage;

        let primary = VectorBucketBackend::new(
            self.vector_buckets.clone(),
            &names.vector_bucket,
            &names.vector_index,
            storage.bucket.clone(),
        );

        let fallback = match &self.search_collections {
            Some(client) if storage.fallback_enabled => Some(SearchCollectionBackend::new(
                client.clone(),
                CollectionNames {
                    collection: names.collection.clone(),
                    index: names.vector_index.clone(),
                    encryption_policy: names.encryption_policy.clone(),
                    network_policy: names.network_policy.clone(),
                    access_policy: names.access_policy.clone(),
                },
                self.access_principals(role_arn),
                storage.collection.clone(),
            )),
            _ => None,
        };

        provision_with_fallback(
            &primary,
            fallback.as_ref().map(|backend| backend as &dyn StorageBackend),
        )
        .await
    }

    /// Wait for a knowledge base that is not yet ACTIVE
    async fn ensure_active(
        &self,
        knowledge_base: KnowledgeBaseRecord,
    ) -> Result<KnowledgeBaseRecord, DomainError> {
        if knowledge_base.status == KnowledgeBaseStatus::Active {
            return Ok(knowledge_base);
        }

        let resource = format!("knowledge base '{}'", knowledge_base.name);
        info!(
            knowledge_base_id = %knowledge_base.id,
            status = %knowledge_base.status,
            "Waiting for knowledge base to become active"
        );

        poll_until(
            &resource,
            || self.knowledge_bases.get_knowledge_base(&knowledge_base.id),
            |kb: &KnowledgeBaseRecord| kb.status.clone(),
            &KnowledgeBaseStatus::Active,
            &[KnowledgeBaseStatus::Failed],
            &self.settings.kb_active_policy,
        )
        .await
        .map_err(|e| {
            e.into_domain_error(
                &resource,
                |kb: &KnowledgeBaseRecord| kb.status.clone(),
                |kb| kb.failure_reasons,
            )
        })
    }

    /// Reuse the knowledge base's first data source, or create one
    async fn ensure_data_source(
        &self,
        knowledge_base_id: &str,
        names: &ResourceNames,
        request: &ProvisionRequest,
    ) -> Result<String, DomainError> {
        let create = CreateDataSourceRequest {
            knowledge_base_id: knowledge_base_id.to_string(),
            name: names.data_source.clone(),
            description: format!("Documents for agent {}", request.agent_name),
            location: request.source.clone(),
            chunking: request.chunking,
        };

        let ensured = ensure_created(
            ResourceKind::DataSource,
            &names.data_source,
            || async {
                self.knowledge_bases
                    .list_data_sources(knowledge_base_id)
                    .await
                    .map(|sources| Presence::from(sources.into_iter().next().map(|ds| ds.id)))
            },
            || async {
                self.knowledge_bases
                    .create_data_source(&create)
                    .await
                    .map(|ds| ds.id)
            },
        )
        .await?;

        if ensured.created {
            info!(data_source_id = %ensured.resource, source = %request.source, "Created data source");
        } else {
            info!(data_source_id = %ensured.resource, "Using existing data source");
        }
        Ok(ensured.resource)
    }

    /// Failures here never fail the run
    async fn associate_agent(
        &self,
        agent_name: &str,
        knowledge_base_id: &str,
        result: &mut ProvisioningResult,
    ) {
        let agent = match self.knowledge_bases.find_agent(agent_name).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                info!("Agent not found, the knowledge base will be associated after registration");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to look up agent for association");
                return;
            }
        };

        result.agent_id = Some(agent.id.clone());
        match self
            .knowledge_bases
            .associate_knowledge_base(
                &agent.id,
                knowledge_base_id,
                &self.settings.association_description,
            )
            .await
        {
            Ok(()) => {
                info!(agent_id = %agent.id, knowledge_base_id, "Associated knowledge base with agent");
                result.agent_associated = true;
            }
            Err(e) if e.is_conflict() => {
                info!(agent_id = %agent.id, "Knowledge base already associated with agent");
                result.agent_associated = true;
            }
            Err(e) => {
                warn!(agent_id = %agent.id, error = %e, "Failed to associate knowledge base with agent");
            }
        }
    }

    async fn lookup_knowledge_base(
        &self,
        name: &str,
    ) -> Result<Presence<KnowledgeBaseRecord>, DomainError> {
        match self.knowledge_bases.find_knowledge_base(name).await? {
            Some(summary) => Presence::from_lookup(
                self.knowledge_bases
                    .get_knowledge_base(&summary.id)
                    .await,
            ),
            None => Ok(Presence::NotFound),
        }
    }

    fn ingestion_runner(&self) -> IngestionRunner {
        IngestionRunner::new(
            self.knowledge_bases.clone(),
            self.settings.ingestion_poll_interval,
        )
        .with_description(self.settings.ingestion_description.clone())
    }

    fn names(&self, agent_name: &str) -> Result<ResourceNames, DomainError> {
        Ok(ResourceNames::derive(agent_name, &self.settings.account_id)?)
    }

    fn role_arn(&self) -> Result<String, DomainError> {
        self.settings
            .role_arn
            .clone()
            .filter(|arn| !arn.trim().is_empty())
            .ok_or_else(|| {
                DomainError::configuration(
                    "No knowledge base role ARN configured \
                     (set knowledge_base.role_arn, --role-arn or KB_ROLE_ARN)",
                )
            })
    }

    /// Knowledge base role, caller identity and configured extras, without duplicates
    fn access_principals(&self, role_arn: &str) -> Vec<String> {
        let mut principals: Vec<String> = Vec::new();
        let candidates = [role_arn, self.settings.caller_arn.as_str()]
            .into_iter()
            .chain(self.settings.storage.extra_principals.iter().map(String::as_str));
        for principal in candidates {
            if !principal.is_empty() && !principals.iter().any(|p| p == principal) {
                principals.push(principal.to_string());
            }
        }
        principals
    }
}
