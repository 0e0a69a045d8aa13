//! Vector storage provisioning with primary/fallback backends

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::polling::{poll_until, settle, PollPolicy};
use crate::domain::resource::{ensure_created, find_existing, Presence, ResourceKind};
use crate::domain::vector_storage::{
    BackendKind, CollectionStatus, DistanceMetric, PolicyDocument, SearchCollectionClient,
    SearchCollection, SearchIndexSpec, SecurityPolicyKind, StorageBackend, VectorBucketClient,
    VectorDataType, VectorIndex, VectorIndexSpec, VectorStorageHandle,
};
use crate::domain::DomainError;

/// Provision vector storage, falling back to a second backend on failure
///
/// The fallback runs at most once. When both fail the error carries both
/// causes; without a fallback the primary error is returned unchanged.
pub async fn provision_with_fallback(
    primary: &dyn StorageBackend,
    fallback: Option<&dyn StorageBackend>,
) -> Result<VectorStorageHandle, DomainError> {
    let primary_error = match primary.provision().await {
        Ok(handle) => {
            record_provisioned(&handle);
            return Ok(handle);
        }
        Err(e) => e,
    };

    let Some(fallback) = fallback else {
        error!(backend = %primary.kind(), error = %primary_error, "Vector storage provisioning failed");
        return Err(primary_error);
    };

    warn!(
        backend = %primary.kind(),
        fallback = %fallback.kind(),
        error = %primary_error,
        "Primary vector storage failed, trying fallback"
    );
    counter!("kb_storage_fallback_total").increment(1);

    match fallback.provision().await {
        Ok(handle) => {
            record_provisioned(&handle);
            Ok(handle)
        }
        Err(fallback_error) => {
            error!(
                primary_error = %primary_error,
                fallback_error = %fallback_error,
                "All vector storage backends failed"
            );
            Err(DomainError::backend_exhausted(primary_error, fallback_error))
        }
    }
}

fn record_provisioned(handle: &VectorStorageHandle) {
    info!(
        backend = %handle.backend_kind(),
        resource_arn = handle.resource_arn(),
        index = handle.index_name(),
        "Vector storage ready"
    );
    counter!("kb_storage_provisioned_total", "backend" => handle.backend_kind().to_string())
        .increment(1);
}

/// Settings for the S3 Vectors bucket + index backend
#[derive(Debug, Clone)]
pub struct BucketBackendSettings {
    pub dimension: u32,
    pub distance_metric: DistanceMetric,
    /// Wait after deleting an index before recreating it
    pub delete_settle: Duration,
    /// Wait after creating an index before a knowledge base may bind to it
    pub create_settle: Duration,
}

impl Default for BucketBackendSettings {
    fn default() -> Self {
        Self {
            dimension: 1024,
            distance_metric: DistanceMetric::Cosine,
            delete_settle: Duration::from_secs(10),
            create_settle: Duration::from_secs(60),
        }
    }
}

/// Primary backend: an S3 Vectors index inside a vector bucket
pub struct VectorBucketBackend {
    client: Arc<dyn VectorBucketClient>,
    bucket_name: String,
    index_name: String,
    settings: BucketBackendSettings,
}

impl fmt::Debug for VectorBucketBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorBucketBackend")
            .field("bucket_name", &self.bucket_name)
            .field("index_name", &self.index_name)
            .field("settings", &self.settings)
            .finish()
    }
}

impl VectorBucketBackend {
    pub fn new(
        client: Arc<dyn VectorBucketClient>,
        bucket_name: impl Into<String>,
        index_name: impl Into<String>,
        settings: BucketBackendSettings,
    ) -> Self {
        Self {
            client,
            bucket_name: bucket_name.into(),
            index_name: index_name.into(),
            settings,
        }
    }

    async fn lookup_index(&self) -> Result<Presence<VectorIndex>, DomainError> {
        Presence::from_lookup(
            self.client
                .get_index(&self.bucket_name, &self.index_name)
                .await,
        )
    }
}

#[async_trait]
impl StorageBackend for VectorBucketBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PrimaryBucketIndex
    }

    async fn provision(&self) -> Result<VectorStorageHandle, DomainError> {
        let bucket = ensure_created(
            ResourceKind::VectorBucket,
            &self.bucket_name,
            || async { Presence::from_lookup(self.client.get_vector_bucket(&self.bucket_name).await) },
            || self.client.create_vector_bucket(&self.bucket_name),
        )
        .await?
        .resource;

        let resource = format!("vector index '{}'", self.index_name);

        // A stale index may have a different dimension; start from scratch
        if find_existing(ResourceKind::VectorIndex, &self.index_name, || self.lookup_index())
            .await?
            .exists()
        {
            info!(index = %self.index_name, "Deleting existing vector index before recreating it");
            if let Err(e) = self
                .client
                .delete_index(&self.bucket_name, &self.index_name)
                .await
            {
                warn!(index = %self.index_name, error = %e, "Failed to delete existing vector index");
            }
            settle(&resource, self.settings.delete_settle).await;
        }

        let spec = VectorIndexSpec {
            name: self.index_name.clone(),
            dimension: self.settings.dimension,
            distance_metric: self.settings.distance_metric,
            data_type: VectorDataType::Float32,
        };

        let index = match self.client.create_index(&self.bucket_name, &spec).await {
            Ok(index) => {
                info!(index = %index.name, dimension = spec.dimension, "Created vector index");
                settle(&resource, self.settings.create_settle).await;
                index
            }
            Err(e) if e.is_conflict() => {
                warn!(index = %self.index_name, "Vector index already exists, reusing it");
                settle(&resource, self.settings.delete_settle).await;
                match find_existing(ResourceKind::VectorIndex, &self.index_name, || self.lookup_index())
                    .await?
                {
                    Presence::Exists(index) => index,
                    Presence::NotFound => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        Ok(VectorStorageHandle::bucket_index(
            bucket.arn,
            index.arn,
            index.name,
        ))
    }
}

/// Settings for the OpenSearch Serverless collection backend
#[derive(Debug, Clone)]
pub struct CollectionBackendSettings {
    pub dimension: u32,
    /// Wait for a new collection to become ACTIVE
    pub active_policy: PollPolicy,
    /// Wait after creating the index before a knowledge base may bind to it
    pub index_settle: Duration,
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
}

impl Default for CollectionBackendSettings {
    fn default() -> Self {
        Self {
            dimension: 1024,
            active_policy: PollPolicy::from_secs(10, 600),
            index_settle: Duration::from_secs(30),
            vector_field: "bedrock-knowledge-base-default-vector".to_string(),
            text_field: "AMAZON_BEDROCK_TEXT_CHUNK".to_string(),
            metadata_field: "AMAZON_BEDROCK_METADATA".to_string(),
        }
    }
}

/// Names of the collection and the policies that guard it
#[derive(Debug, Clone)]
pub struct CollectionNames {
    pub collection: String,
    pub index: String,
    pub encryption_policy: String,
    pub network_policy: String,
    pub access_policy: String,
}

/// Fallback backend: a vector search collection with a knn index
pub struct SearchCollectionBackend {
    client: Arc<dyn SearchCollectionClient>,
    names: CollectionNames,
    /// Principals granted data access (knowledge base role, caller, extras)
    principals: Vec<String>,
    settings: CollectionBackendSettings,
}

impl fmt::Debug for SearchCollectionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCollectionBackend")
            .field("names", &self.names)
            .field("principals", &self.principals)
            .field("settings", &self.settings)
            .finish()
    }
}

impl SearchCollectionBackend {
    pub fn new(
        client: Arc<dyn SearchCollectionClient>,
        names: CollectionNames,
        principals: Vec<String>,
        settings: CollectionBackendSettings,
    ) -> Self {
        Self {
            client,
            names,
            principals,
            settings,
        }
    }

    fn encryption_policy(&self) -> PolicyDocument {
        PolicyDocument {
            name: self.names.encryption_policy.clone(),
            policy: json!({
                "Rules": [{
                    "ResourceType": "collection",
                    "Resource": [format!("collection/{}", self.names.collection)]
                }],
                "AWSOwnedKey": true
            }),
        }
    }

    fn network_policy(&self) -> PolicyDocument {
        let resource = format!("collection/{}", self.names.collection);
        PolicyDocument {
            name: self.names.network_policy.clone(),
            policy: json!([{
                "Rules": [
                    { "ResourceType": "collection", "Resource": [resource] },
                    { "ResourceType": "dashboard", "Resource": [resource] }
                ],
                "AllowFromPublic": true
            }]),
        }
    }

    fn access_policy(&self) -> PolicyDocument {
        PolicyDocument {
            name: self.names.access_policy.clone(),
            policy: json!([{
                "Rules": [
                    {
                        "ResourceType": "collection",
                        "Resource": [format!("collection/{}", self.names.collection)],
                        "Permission": [
                            "aoss:CreateCollectionItems",
                            "aoss:UpdateCollectionItems",
                            "aoss:DescribeCollectionItems"
                        ]
                    },
                    {
                        "ResourceType": "index",
                        "Resource": [format!("index/{}/*", self.names.collection)],
                        "Permission": [
                            "aoss:CreateIndex",
                            "aoss:DescribeIndex",
                            "aoss:ReadDocument",
                            "aoss:WriteDocument",
                            "aoss:UpdateIndex",
                            "aoss:DeleteIndex"
                        ]
                    }
                ],
                "Principal": self.principals
            }]),
        }
    }

    async fn ensure_security_policy(
        &self,
        kind: SecurityPolicyKind,
        policy: PolicyDocument,
    ) -> Result<(), DomainError> {
        ensure_created(
            ResourceKind::SecurityPolicy,
            &policy.name,
            || async {
                Presence::from_lookup(self.client.get_security_policy(kind, &policy.name).await)
            },
            || self.client.create_security_policy(kind, &policy),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SearchCollectionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FallbackSearchCollection
    }

    async fn provision(&self) -> Result<VectorStorageHandle, DomainError> {
        // The collection cannot be created before its encryption and network policies
        self.ensure_security_policy(SecurityPolicyKind::Encryption, self.encryption_policy())
            .await?;
        self.ensure_security_policy(SecurityPolicyKind::Network, self.network_policy())
            .await?;

        let access_policy = self.access_policy();
        ensure_created(
            ResourceKind::AccessPolicy,
            &access_policy.name,
            || async {
                Presence::from_lookup(self.client.get_access_policy(&access_policy.name).await)
            },
            || self.client.create_access_policy(&access_policy),
        )
        .await?;

        let name = &self.names.collection;
        ensure_created(
            ResourceKind::SearchCollection,
            name,
            || async { self.client.find_collection(name).await.map(Presence::from) },
            || self.client.create_collection(name),
        )
        .await?;

        let resource = format!("search collection '{}'", name);
        let collection = poll_until(
            &resource,
            || async {
                self.client.find_collection(name).await.and_then(|found| {
                    found.ok_or_else(|| DomainError::not_found(format!("collection {}", name)))
                })
            },
            |collection: &SearchCollection| collection.status.clone(),
            &CollectionStatus::Active,
            &[CollectionStatus::Failed],
            &self.settings.active_policy,
        )
        .await
        .map_err(|e| {
            e.into_domain_error(&resource, |c: &SearchCollection| c.status.clone(), |_| Vec::new())
        })?;

        let endpoint = collection.endpoint.clone().ok_or_else(|| {
            DomainError::provider("aoss", format!("collection {} has no endpoint", name))
        })?;

        let spec = SearchIndexSpec {
            name: self.names.index.clone(),
            dimension: self.settings.dimension,
            vector_field: self.settings.vector_field.clone(),
            text_field: self.settings.text_field.clone(),
            metadata_field: self.settings.metadata_field.clone(),
        };
        match self.client.create_vector_index(&endpoint, &spec).await {
            Ok(()) => info!(index = %spec.name, collection = %name, "Created search index"),
            Err(e) if e.is_conflict() => {
                info!(index = %spec.name, collection = %name, "Search index already exists, reusing it");
            }
            Err(e) => return Err(e),
        }
        settle(&format!("search index '{}'", spec.name), self.settings.index_settle).await;

        Ok(VectorStorageHandle::search_collection(
            collection.arn,
            spec.name,
            Some(endpoint),
        ))
    }
}
