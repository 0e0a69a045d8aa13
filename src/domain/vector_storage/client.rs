//! Client traits for the vector storage services

use std::fmt::Debug;

use async_trait::async_trait;

use super::handle::{
    BackendKind, PolicyDocument, SearchCollection, SearchIndexSpec, SecurityPolicyKind,
    VectorBucket, VectorIndex, VectorIndexSpec, VectorStorageHandle,
};
use crate::domain::DomainError;

/// S3 Vectors operations used by the primary backend
///
/// Lookups return `DomainError::NotFound` for absent resources and creates
/// return `DomainError::Conflict` when the resource already exists.
#[async_trait]
pub trait VectorBucketClient: Send + Sync + Debug {
    async fn get_vector_bucket(&self, bucket_name: &str) -> Result<VectorBucket, DomainError>;

    async fn create_vector_bucket(&self, bucket_name: &str) -> Result<VectorBucket, DomainError>;

    async fn get_index(&self, bucket_name: &str, index_name: &str)
    -> Result<VectorIndex, DomainError>;

    async fn create_index(
        &self,
        bucket_name: &str,
        spec: &VectorIndexSpec,
    ) -> Result<VectorIndex, DomainError>;

    async fn delete_index(&self, bucket_name: &str, index_name: &str) -> Result<(), DomainError>;
}

/// OpenSearch Serverless operations used by the fallback backend
#[async_trait]
pub trait SearchCollectionClient: Send + Sync + Debug {
    async fn get_security_policy(
        &self,
        kind: SecurityPolicyKind,
        name: &str,
    ) -> Result<PolicyDocument, DomainError>;

    async fn create_security_policy(
        &self,
        kind: SecurityPolicyKind,
        policy: &PolicyDocument,
    ) -> Result<PolicyDocument, DomainError>;

    async fn get_access_policy(&self, name: &str) -> Result<PolicyDocument, DomainError>;

    async fn create_access_policy(
        &self,
        policy: &PolicyDocument,
    ) -> Result<PolicyDocument, DomainError>;

    async fn find_collection(&self, name: &str) -> Result<Option<SearchCollection>, DomainError>;

    async fn create_collection(&self, name: &str) -> Result<SearchCollection, DomainError>;

    /// Create a vector index through the collection's signed data-plane endpoint
    async fn create_vector_index(
        &self,
        endpoint: &str,
        spec: &SearchIndexSpec,
    ) -> Result<(), DomainError>;
}

/// One way of provisioning vector storage
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    fn kind(&self) -> BackendKind;

    async fn provision(&self) -> Result<VectorStorageHandle, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::vector_storage::CollectionStatus;

    fn bucket_arn(name: &str) -> String {
        format!("arn:aws:s3vectors:us-east-1:123456789012:bucket/{}", name)
    }

    /// In-memory S3 Vectors fake
    #[derive(Debug, Default)]
    pub struct MockVectorBucketClient {
        buckets: Mutex<HashMap<String, VectorBucket>>,
        indexes: Mutex<HashMap<(String, String), VectorIndex>>,
        fail_with: Mutex<Option<String>>,
        delete_error: Option<String>,
        create_conflict: bool,
        pub index_creates: AtomicUsize,
        pub index_deletes: AtomicUsize,
    }

    impl MockVectorBucketClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_bucket(self, name: &str) -> Self {
            self.buckets.lock().unwrap().insert(
                name.to_string(),
                VectorBucket {
                    name: name.to_string(),
                    arn: bucket_arn(name),
                },
            );
            self
        }

        pub fn with_index(self, bucket: &str, index: &str) -> Self {
            self.indexes.lock().unwrap().insert(
                (bucket.to_string(), index.to_string()),
                VectorIndex {
                    name: index.to_string(),
                    arn: format!("{}/index/{}", bucket_arn(bucket), index),
                },
            );
            self
        }

        /// Make every call fail with a provider error
        pub fn failing(self, message: &str) -> Self {
            *self.fail_with.lock().unwrap() = Some(message.to_string());
            self
        }

        /// Make index deletion fail; the index stays in place
        pub fn failing_delete(mut self, message: &str) -> Self {
            self.delete_error = Some(message.to_string());
            self
        }

        /// Index creation reports a conflict after a concurrent creator made the index
        pub fn conflicting_create(mut self) -> Self {
            self.create_conflict = true;
            self
        }

        pub fn has_index(&self, bucket: &str, index: &str) -> bool {
            self.indexes
                .lock()
                .unwrap()
                .contains_key(&(bucket.to_string(), index.to_string()))
        }

        fn check_failure(&self) -> Result<(), DomainError> {
            match self.fail_with.lock().unwrap().as_ref() {
                Some(message) => Err(DomainError::provider("s3vectors", message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl VectorBucketClient for MockVectorBucketClient {
        async fn get_vector_bucket(&self, bucket_name: &str) -> Result<VectorBucket, DomainError> {
            self.check_failure()?;
            self.buckets
                .lock()
                .unwrap()
                .get(bucket_name)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("bucket {}", bucket_name)))
        }

        async fn create_vector_bucket(
            &self,
            bucket_name: &str,
        ) -> Result<VectorBucket, DomainError> {
            self.check_failure()?;
            let mut buckets = self.buckets.lock().unwrap();
            if buckets.contains_key(bucket_name) {
                return Err(DomainError::conflict(format!("bucket {}", bucket_name)));
            }
            let bucket = VectorBucket {
                name: bucket_name.to_string(),
                arn: bucket_arn(bucket_name),
            };
            buckets.insert(bucket_name.to_string(), bucket.clone());
            Ok(bucket)
        }

        async fn get_index(
            &self,
            bucket_name: &str,
            index_name: &str,
        ) -> Result<VectorIndex, DomainError> {
            self.check_failure()?;
            self.indexes
                .lock()
                .unwrap()
                .get(&(bucket_name.to_string(), index_name.to_string()))
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("index {}", index_name)))
        }

        async fn create_index(
            &self,
            bucket_name: &str,
            spec: &VectorIndexSpec,
        ) -> Result<VectorIndex, DomainError> {
            self.check_failure()?;
            self.index_creates.fetch_add(1, Ordering::SeqCst);
            let key = (bucket_name.to_string(), spec.name.clone());
            let mut indexes = self.indexes.lock().unwrap();
            if indexes.contains_key(&key) {
                return Err(DomainError::conflict(format!("index {}", spec.name)));
            }
            let index = VectorIndex {
                name: spec.name.clone(),
                arn: format!("{}/index/{}", bucket_arn(bucket_name), spec.name),
            };
            indexes.insert(key, index.clone());
            if self.create_conflict {
                return Err(DomainError::conflict(format!("index {}", spec.name)));
            }
            Ok(index)
        }

        async fn delete_index(&self, bucket_name: &str, index_name: &str) -> Result<(), DomainError> {
            self.check_failure()?;
            self.index_deletes.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.delete_error {
                return Err(DomainError::provider("s3vectors", message.clone()));
            }
            self.indexes
                .lock()
                .unwrap()
                .remove(&(bucket_name.to_string(), index_name.to_string()))
                .map(|_| ())
                .ok_or_else(|| DomainError::not_found(format!("index {}", index_name)))
        }
    }

    /// In-memory OpenSearch Serverless fake
    ///
    /// New collections report `CREATING` for `creating_polls` lookups before
    /// turning `ACTIVE`.
    #[derive(Debug, Default)]
    pub struct MockSearchCollectionClient {
        security_policies: Mutex<HashMap<String, PolicyDocument>>,
        access_policies: Mutex<HashMap<String, PolicyDocument>>,
        collections: Mutex<HashMap<String, SearchCollection>>,
        pending_polls: Mutex<HashMap<String, usize>>,
        creating_polls: usize,
        final_status: Option<CollectionStatus>,
        existing_index: bool,
        pub indexes: Mutex<Vec<SearchIndexSpec>>,
    }

    impl MockSearchCollectionClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_creating_polls(mut self, polls: usize) -> Self {
            self.creating_polls = polls;
            self
        }

        /// Status a collection settles into instead of `ACTIVE`
        pub fn with_final_status(mut self, status: CollectionStatus) -> Self {
            self.final_status = Some(status);
            self
        }

        /// The search index already exists, so creating it conflicts
        pub fn with_existing_index(mut self) -> Self {
            self.existing_index = true;
            self
        }

        pub fn security_policy_names(&self) -> Vec<String> {
            let mut names: Vec<String> =
                self.security_policies.lock().unwrap().keys().cloned().collect();
            names.sort();
            names
        }

        pub fn access_policy(&self, name: &str) -> Option<PolicyDocument> {
            self.access_policies.lock().unwrap().get(name).cloned()
        }
    }

    #[async_trait]
    impl SearchCollectionClient for MockSearchCollectionClient {
        async fn get_security_policy(
            &self,
            kind: SecurityPolicyKind,
            name: &str,
        ) -> Result<PolicyDocument, DomainError> {
            self.security_policies
                .lock()
                .unwrap()
                .get(&format!("{}:{}", kind, name))
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("policy {}", name)))
        }

        async fn create_security_policy(
            &self,
            kind: SecurityPolicyKind,
            policy: &PolicyDocument,
        ) -> Result<PolicyDocument, DomainError> {
            self.security_policies
                .lock()
                .unwrap()
                .insert(format!("{}:{}", kind, policy.name), policy.clone());
            Ok(policy.clone())
        }

        async fn get_access_policy(&self, name: &str) -> Result<PolicyDocument, DomainError> {
            self.access_policies
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("access policy {}", name)))
        }

        async fn create_access_policy(
            &self,
            policy: &PolicyDocument,
        ) -> Result<PolicyDocument, DomainError> {
            self.access_policies
                .lock()
                .unwrap()
                .insert(policy.name.clone(), policy.clone());
            Ok(policy.clone())
        }

        async fn find_collection(&self, name: &str) -> Result<Option<SearchCollection>, DomainError> {
            let mut collections = self.collections.lock().unwrap();
            let Some(collection) = collections.get_mut(name) else {
                return Ok(None);
            };

            let mut pending = self.pending_polls.lock().unwrap();
            let remaining = pending.entry(name.to_string()).or_insert(0);
            if *remaining > 0 {
                *remaining -= 1;
            } else {
                collection.status = self
                    .final_status
                    .clone()
                    .unwrap_or(CollectionStatus::Active);
            }
            Ok(Some(collection.clone()))
        }

        async fn create_collection(&self, name: &str) -> Result<SearchCollection, DomainError> {
            let collection = SearchCollection {
                id: format!("{}-id", name),
                name: name.to_string(),
                arn: format!("arn:aws:aoss:us-east-1:123456789012:collection/{}-id", name),
                endpoint: Some(format!("https://{}-id.us-east-1.aoss.amazonaws.com", name)),
                status: CollectionStatus::Creating,
            };
            self.collections
                .lock()
                .unwrap()
                .insert(name.to_string(), collection.clone());
            self.pending_polls
                .lock()
                .unwrap()
                .insert(name.to_string(), self.creating_polls);
            Ok(collection)
        }

        async fn create_vector_index(
            &self,
            _endpoint: &str,
            spec: &SearchIndexSpec,
        ) -> Result<(), DomainError> {
            if self.existing_index {
                return Err(DomainError::conflict(format!("index {}", spec.name)));
            }
            self.indexes.lock().unwrap().push(spec.clone());
            Ok(())
        }
    }
}
