//! OpenSearch Serverless adapter for the fallback vector storage backend

use std::fmt;

use async_trait::async_trait;
use aws_sdk_opensearchserverless::types::{
    AccessPolicyType, CollectionDetail, CollectionType, SecurityPolicyType,
};
use aws_sdk_opensearchserverless::Client;
use aws_smithy_types::Document;
use tracing::debug;

use super::context::AwsContext;
use super::error::{classify_sdk_error, missing_field};
use super::signed_http::{SignedHttpClient, SignedResponse};
use crate::domain::vector_storage::{
    CollectionStatus, PolicyDocument, SearchCollection, SearchCollectionClient, SearchIndexSpec,
    SecurityPolicyKind,
};
use crate::domain::DomainError;

const SERVICE: &str = "opensearchserverless";
const DATA_PLANE_SERVICE: &str = "aoss";

pub struct OpenSearchServerlessClient {
    client: Client,
    data_plane: SignedHttpClient,
}

impl fmt::Debug for OpenSearchServerlessClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSearchServerlessClient")
            .field("data_plane", &self.data_plane)
            .finish()
    }
}

impl OpenSearchServerlessClient {
    pub fn new(context: &AwsContext) -> Result<Self, DomainError> {
        Ok(Self {
            client: Client::new(context.sdk_config()),
            data_plane: SignedHttpClient::new(context, DATA_PLANE_SERVICE)?,
        })
    }
}

#[async_trait]
impl SearchCollectionClient for OpenSearchServerlessClient {
    async fn get_security_policy(
        &self,
        kind: SecurityPolicyKind,
        name: &str,
    ) -> Result<PolicyDocument, DomainError> {
        let response = self
            .client
            .get_security_policy()
            .name(name)
            .r#type(security_policy_type(kind))
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "GetSecurityPolicy", e))?;

        let detail = response
            .security_policy_detail()
            .ok_or_else(|| missing_field(SERVICE, "GetSecurityPolicy", "securityPolicyDetail"))?;

        Ok(PolicyDocument {
            name: detail.name().unwrap_or(name).to_string(),
            policy: detail.policy().map(doc_to_json).unwrap_or_default(),
        })
    }

    async fn create_security_policy(
        &self,
        kind: SecurityPolicyKind,
        policy: &PolicyDocument,
    ) -> Result<PolicyDocument, DomainError> {
        self.client
            .create_security_policy()
            .name(&policy.name)
            .r#type(security_policy_type(kind))
            .policy(policy.policy.to_string())
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "CreateSecurityPolicy", e))?;
        Ok(policy.clone())
    }

    async fn get_access_policy(&self, name: &str) -> Result<PolicyDocument, DomainError> {
        let response = self
            .client
            .get_access_policy()
            .name(name)
            .r#type(AccessPolicyType::Data)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "GetAccessPolicy", e))?;

        let detail = response
            .access_policy_detail()
            .ok_or_else(|| missing_field(SERVICE, "GetAccessPolicy", "accessPolicyDetail"))?;

        Ok(PolicyDocument {
            name: detail.name().unwrap_or(name).to_string(),
            policy: detail.policy().map(doc_to_json).unwrap_or_default(),
        })
    }

    async fn create_access_policy(
        &self,
        policy: &PolicyDocument,
    ) -> Result<PolicyDocument, DomainError> {
        self.client
            .create_access_policy()
            .name(&policy.name)
            .r#type(AccessPolicyType::Data)
            .policy(policy.policy.to_string())
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "CreateAccessPolicy", e))?;
        Ok(policy.clone())
    }

    async fn find_collection(&self, name: &str) -> Result<Option<SearchCollection>, DomainError> {
        let response = self
            .client
            .batch_get_collection()
            .names(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "BatchGetCollection", e))?;

        Ok(response
            .collection_details()
            .iter()
            .find(|detail| detail.name() == Some(name))
            .map(|detail| collection(detail, name)))
    }

    async fn create_collection(&self, name: &str) -> Result<SearchCollection, DomainError> {
        let response = self
            .client
            .create_collection()
            .name(name)
            .r#type(CollectionType::Vectorsearch)
            .send()
            .await
            .map_err(|e| classify_sdk_error(SERVICE, "CreateCollection", e))?;

        let detail = response
            .create_collection_detail()
            .ok_or_else(|| missing_field(SERVICE, "CreateCollection", "createCollectionDetail"))?;

        Ok(SearchCollection {
            id: detail.id().unwrap_or_default().to_string(),
            name: detail.name().unwrap_or(name).to_string(),
            arn: detail
                .arn()
                .ok_or_else(|| missing_field(SERVICE, "CreateCollection", "arn"))?
                .to_string(),
            endpoint: None,
            status: detail
                .status()
                .map(|status| CollectionStatus::parse(status.as_str()))
                .unwrap_or(CollectionStatus::Creating),
        })
    }

    async fn create_vector_index(
        &self,
        endpoint: &str,
        spec: &SearchIndexSpec,
    ) -> Result<(), DomainError> {
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), spec.name);
        debug!(url = %url, dimension = spec.dimension, "Creating collection vector index");

        let response = self.data_plane.put_json(&url, &spec.to_mapping()).await?;
        index_response(&spec.name, response)
    }
}

fn security_policy_type(kind: SecurityPolicyKind) -> SecurityPolicyType {
    match kind {
        SecurityPolicyKind::Encryption => SecurityPolicyType::Encryption,
        SecurityPolicyKind::Network => SecurityPolicyType::Network,
    }
}

fn collection(detail: &CollectionDetail, name: &str) -> SearchCollection {
    SearchCollection {
        id: detail.id().unwrap_or_default().to_string(),
        name: detail.name().unwrap_or(name).to_string(),
        arn: detail.arn().unwrap_or_default().to_string(),
        endpoint: detail.collection_endpoint().map(str::to_string),
        status: detail
            .status()
            .map(|status| CollectionStatus::parse(status.as_str()))
            .unwrap_or_else(|| CollectionStatus::Unknown("UNREPORTED".to_string())),
    }
}

/// Map a data-plane index creation response onto the client error contract
fn index_response(index: &str, response: SignedResponse) -> Result<(), DomainError> {
    if response.is_success() {
        return Ok(());
    }
    if response.body.contains("resource_already_exists_exception") {
        return Err(DomainError::conflict(format!("Index '{}' already exists", index)));
    }
    match response.status {
        404 => Err(DomainError::not_found(format!(
            "Collection endpoint for index '{}' not found: {}",
            index, response.body
        ))),
        status => Err(DomainError::provider(
            DATA_PLANE_SERVICE,
            format!("Create index '{}' returned HTTP {}: {}", index, status, response.body),
        )),
    }
}

fn doc_to_json(doc: &Document) -> serde_json::Value {
    match doc {
        Document::String(s) => serde_json::Value::String(s.clone()),
        Document::Number(n) => serde_json::json!(n.to_f64_lossy()),
        Document::Bool(b) => serde_json::Value::Bool(*b),
        Document::Null => serde_json::Value::Null,
        Document::Array(items) => serde_json::Value::Array(items.iter().map(doc_to_json).collect()),
        Document::Object(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), doc_to_json(value)))
                .collect(),
        ),
    }
}
