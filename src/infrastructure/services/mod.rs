//! Infrastructure services

mod ingestion_service;
mod knowledge_base_service;
mod storage_service;

pub use ingestion_service::IngestionRunner;
pub use knowledge_base_service::{KnowledgeBaseProvisioner, ProvisionerSettings, StorageSettings};
pub use storage_service::{
    provision_with_fallback, BucketBackendSettings, CollectionBackendSettings, CollectionNames,
    SearchCollectionBackend, VectorBucketBackend,
};
