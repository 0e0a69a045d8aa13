//! SigV4-signed HTTP requests for service data planes without an SDK

use std::fmt;
use std::time::SystemTime;

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use tracing::debug;

use super::context::AwsContext;
use crate::domain::DomainError;

/// Raw response of a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedResponse {
    pub status: u16,
    pub body: String,
}

impl SignedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct SignedHttpClient {
    client: reqwest::Client,
    credentials: SharedCredentialsProvider,
    region: String,
    service: &'static str,
}

impl fmt::Debug for SignedHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedHttpClient")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish()
    }
}

impl SignedHttpClient {
    pub fn new(context: &AwsContext, service: &'static str) -> Result<Self, DomainError> {
        let credentials = context
            .sdk_config()
            .credentials_provider()
            .ok_or_else(|| DomainError::configuration("No AWS credentials provider available"))?;
        let region = context
            .region()
            .ok_or_else(|| DomainError::configuration("No AWS region configured"))?
            .to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            credentials,
            region,
            service,
        })
    }

    /// PUT a JSON body, returning the response whatever its status
    pub async fn put_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<SignedResponse, DomainError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| DomainError::internal(format!("Failed to encode request body: {}", e)))?;

        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| DomainError::configuration(format!("Failed to load AWS credentials: {}", e)))?;
        let identity: Identity = credentials.into();

        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .map_err(|e| DomainError::internal(format!("Invalid signing parameters: {}", e)))?
            .into();

        let headers = [("content-type", "application/json")];
        let signable = SignableRequest::new(
            "PUT",
            url,
            headers.iter().copied(),
            SignableBody::Bytes(&payload),
        )
        .map_err(|e| DomainError::internal(format!("Request cannot be signed: {}", e)))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| DomainError::internal(format!("Request signing failed: {}", e)))?
            .into_parts();

        let mut request = self
            .client
            .put(url)
            .header("content-type", "application/json");
        for (name, value) in instructions.headers() {
            request = request.header(name, value);
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| DomainError::provider(self.service, format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(url, status, service = self.service, "Signed request completed");

        Ok(SignedResponse { status, body })
    }
}
