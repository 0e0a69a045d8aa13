//! Vector storage domain - backends a knowledge base stores embeddings in

mod client;
mod handle;

pub use client::{SearchCollectionClient, StorageBackend, VectorBucketClient};
pub use handle::{
    BackendKind, CollectionStatus, DistanceMetric, PolicyDocument, SearchCollection,
    SearchIndexSpec, SecurityPolicyKind, VectorBucket, VectorDataType, VectorIndex,
    VectorIndexSpec, VectorStorageHandle,
};

#[cfg(test)]
pub use client::mock::{MockSearchCollectionClient, MockVectorBucketClient};
