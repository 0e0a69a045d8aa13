//! AWS adapters for the knowledge base, vector storage and identity services

mod bedrock_agent;
mod context;
mod error;
mod opensearch_serverless;
mod s3_vectors;
mod signed_http;

pub use bedrock_agent::{BedrockAgentClient, SearchFieldMapping};
pub use context::AwsContext;
pub use error::classify_sdk_error;
pub use opensearch_serverless::OpenSearchServerlessClient;
pub use s3_vectors::S3VectorsClient;
pub use signed_http::{SignedHttpClient, SignedResponse};
