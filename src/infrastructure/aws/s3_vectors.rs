//! S3 Vectors adapter for the primary vector storage backend

use std::fmt;

use async_trait::async_trait;
use aws_sdk_s3vectors::types::{DataType, DistanceMetric as SdkDistanceMetric};
use aws_sdk_s3vectors::Client;

use super::context::AwsContext;
use super::error::{classify_sdk_error, missing_field};
use crate::domain::vector_storage::{
    DistanceMetric, VectorBucket, VectorBucketClient, VectorDataType, VectorIndex,
    VectorIndexSpec,
};
use crate::domain::DomainError;

const SERVICE: &str = "s3vectors";

pub struct S3VectorsClient {
    client: Client,
}

impl fmt::Debug for S3VectorsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3VectorsClient").finish()
    }
}

impl S3VectorsClient {
    pub fn new(context: &AwsContext) -> Self {
        Self {
            client: Client::new(context.sdk_config()),
        }
    }
}

#[async_trait]
impl VectorBucketClient for S3VectorsClient {
    async fn get_vector_bucket(&self, bucket_name: &str) -> Result<VectorBucket, DomainError> {
        let response = self
            .client
            .get_vector_bucket()
            .vector_bucket_name(bucket_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "GetVectorBucket", e))?;

        let bucket = response
            .vector_bucket()
            .ok_or_else(|| missing_field(SERVICE, "GetVectorBucket", "vectorBucket"))?;

        Ok(VectorBucket {
            name: bucket.vector_bucket_name().to_string(),
            arn: bucket.vector_bucket_arn().to_string(),
        })
    }

    async fn create_vector_bucket(&self, bucket_name: &str) -> Result<VectorBucket, DomainError> {
        self.client
            .create_vector_bucket()
            .vector_bucket_name(bucket_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "CreateVectorBucket", e))?;

        self.get_vector_bucket(bucket_name).await
    }

    async fn get_index(
        &self,
        bucket_name: &str,
        index_name: &str,
    ) -> Result<VectorIndex, DomainError> {
        let response = self
            .client
            .get_index()
            .vector_bucket_name(bucket_name)
            .index_name(index_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "GetIndex", e))?;

        let index = response
            .index()
            .ok_or_else(|| missing_field(SERVICE, "GetIndex", "index"))?;

        Ok(VectorIndex {
            name: index.index_name().to_string(),
            arn: index.index_arn().to_string(),
        })
    }

    async fn create_index(
        &self,
        bucket_name: &str,
        spec: &VectorIndexSpec,
    ) -> Result<VectorIndex, DomainError> {
        let dimension = i32::try_from(spec.dimension).map_err(|_| {
            DomainError::validation(format!("Index dimension {} is out of range", spec.dimension))
        })?;

        self.client
            .create_index()
            .vector_bucket_name(bucket_name)
            .index_name(&spec.name)
            .dimension(dimension)
            .distance_metric(distance_metric(spec.distance_metric))
            .data_type(data_type(spec.data_type))
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "CreateIndex", e))?;

        self.get_index(bucket_name, &spec.name).await
    }

    async fn delete_index(&self, bucket_name: &str, index_name: &str) -> Result<(), DomainError> {
        self.client
            .delete_index()
            .vector_bucket_name(bucket_name)
            .index_name(index_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "DeleteIndex", e))?;
        Ok(())
    }
}

fn distance_metric(metric: DistanceMetric) -> SdkDistanceMetric {
    match metric {
        DistanceMetric::Cosine => SdkDistanceMetric::Cosine,
        DistanceMetric::Euclidean => SdkDistanceMetric::Euclidean,
    }
}

fn data_type(data_type: VectorDataType) -> DataType {
    match data_type {
        VectorDataType::Float32 => DataType::Float32,
    }
}
