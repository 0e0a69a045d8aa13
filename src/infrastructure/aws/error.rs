//! Normalization of AWS SDK errors into domain errors

use std::error::Error;
use std::fmt::Debug;

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

use crate::domain::DomainError;

const NOT_FOUND_CODES: &[&str] = &[
    "NotFoundException",
    "ResourceNotFoundException",
    "NoSuchVectorBucket",
    "NoSuchIndex",
];

const CONFLICT_CODES: &[&str] = &["ConflictException", "ResourceAlreadyExistsException"];

/// Map an SDK error to `NotFound`, `Conflict` or `Provider`
///
/// Every adapter routes its failures through here so callers can rely on
/// `is_not_found` / `is_conflict` regardless of the service.
pub fn classify_sdk_error<E, R>(
    service: &str,
    operation: &str,
    error: SdkError<E, R>,
) -> DomainError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug,
{
    let code = error.code().map(str::to_string);
    let message = DisplayErrorContext(&error).to_string();
    classify_code(service, operation, code.as_deref(), &message)
}

pub(crate) fn classify_code(
    service: &str,
    operation: &str,
    code: Option<&str>,
    message: &str,
) -> DomainError {
    let detail = format!("{} failed: {}", operation, message);
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => DomainError::not_found(detail),
        Some(code) if CONFLICT_CODES.contains(&code) => DomainError::conflict(detail),
        _ => DomainError::provider(service, detail),
    }
}

/// Error for a response that lacks a field the service documents as present
pub(crate) fn missing_field(service: &str, operation: &str, field: &str) -> DomainError {
    DomainError::provider(
        service,
        format!("{} response did not include {}", operation, field),
    )
}

/// Error for a request a typed SDK builder refused to build
pub(crate) fn build_error(service: &str, what: &str, error: impl std::fmt::Display) -> DomainError {
    DomainError::internal(format!("Invalid {} {} request: {}", service, what, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_codes() {
        for code in NOT_FOUND_CODES {
            let error = classify_code("s3vectors", "GetIndex", Some(code), "missing");
            assert!(error.is_not_found(), "{} should map to NotFound", code);
        }
    }

    #[test]
    fn test_conflict_codes() {
        let error = classify_code(
            "opensearchserverless",
            "CreateCollection",
            Some("ConflictException"),
            "already exists",
        );
        assert!(error.is_conflict());
        assert!(error.to_string().contains("CreateCollection failed: already exists"));
    }

    #[test]
    fn test_other_codes_are_provider_errors() {
        let error = classify_code(
            "bedrock-agent",
            "CreateKnowledgeBase",
            Some("AccessDeniedException"),
            "not authorized",
        );
        assert!(matches!(
            error,
            DomainError::Provider { ref provider, .. } if provider == "bedrock-agent"
        ));

        let error = classify_code("bedrock-agent", "ListAgents", None, "dispatch failure");
        assert!(matches!(error, DomainError::Provider { .. }));
    }
}
