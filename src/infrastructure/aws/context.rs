//! Shared AWS SDK configuration and caller identity

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

use super::error::{classify_sdk_error, missing_field};
use crate::config::AwsConfig;
use crate::domain::DomainError;

/// SDK configuration plus who the run executes as
#[derive(Debug, Clone)]
pub struct AwsContext {
    sdk_config: SdkConfig,
    pub account_id: String,
    pub caller_arn: String,
}

impl AwsContext {
    /// Load credentials and region from the default chain and resolve the caller identity
    pub async fn load(config: &AwsConfig) -> Result<Self, DomainError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            return Err(DomainError::configuration(
                "No AWS region configured (set aws.region, --region or AWS_REGION)",
            ));
        }

        let identity = aws_sdk_sts::Client::new(&sdk_config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| classify_sdk_error("sts", "GetCallerIdentity", e))?;

        let account_id = identity
            .account()
            .ok_or_else(|| missing_field("sts", "GetCallerIdentity", "account"))?
            .to_string();
        let caller_arn = identity
            .arn()
            .ok_or_else(|| missing_field("sts", "GetCallerIdentity", "arn"))?
            .to_string();

        info!(
            account_id = %account_id,
            caller_arn = %caller_arn,
            region = ?sdk_config.region().map(|r| r.as_ref()),
            "Resolved AWS caller identity"
        );

        Ok(Self {
            sdk_config,
            account_id,
            caller_arn,
        })
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }

    pub fn region(&self) -> Option<&str> {
        self.sdk_config.region().map(|region| region.as_ref())
    }
}
