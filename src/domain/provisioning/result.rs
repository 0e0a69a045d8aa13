//! Result record handed to the downstream agent registration step

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ingestion::{IngestionJob, IngestionStatistics};
use crate::domain::vector_storage::{BackendKind, VectorStorageHandle};
use crate::domain::DomainError;

/// Overall outcome of a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Provisioning disabled for this run
    Skipped,
    /// The knowledge base already existed and was reused
    Existing,
    Created,
    /// A setup step failed
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionOutcomeStatus {
    Skipped,
    Completed,
    Failed,
    TimedOut,
    Error,
}

/// What happened to the ingestion job of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub status: IngestionOutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub statistics: IngestionStatistics,
    /// Reasons reported by the service, verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestionOutcome {
    pub fn skipped() -> Self {
        Self {
            status: IngestionOutcomeStatus::Skipped,
            job_id: None,
            statistics: IngestionStatistics::default(),
            failure_reasons: Vec::new(),
            error: None,
        }
    }

    pub fn completed(job: IngestionJob) -> Self {
        Self {
            status: IngestionOutcomeStatus::Completed,
            job_id: Some(job.id),
            statistics: job.statistics,
            ..Self::skipped()
        }
    }

    pub fn failed(job: IngestionJob) -> Self {
        Self {
            status: IngestionOutcomeStatus::Failed,
            job_id: Some(job.id),
            statistics: job.statistics,
            failure_reasons: job.failure_reasons,
            ..Self::skipped()
        }
    }

    /// The job outlived its budget; it keeps running remotely
    pub fn timed_out(job_id: Option<String>, error: &DomainError) -> Self {
        Self {
            status: IngestionOutcomeStatus::TimedOut,
            job_id,
            error: Some(error.to_string()),
            ..Self::skipped()
        }
    }

    pub fn error(job_id: Option<String>, error: &DomainError) -> Self {
        Self {
            status: IngestionOutcomeStatus::Error,
            job_id,
            error: Some(error.to_string()),
            ..Self::skipped()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == IngestionOutcomeStatus::Completed
    }
}

/// The single JSON record a provisioning run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    pub enabled: bool,
    pub agent_name: String,
    pub knowledge_base_id: Option<String>,
    pub data_source_id: Option<String>,
    pub status: OverallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_backend: Option<BackendKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<VectorStorageHandle>,
    pub ingestion: IngestionOutcome,
    pub agent_associated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl ProvisioningResult {
    /// A result with nothing provisioned yet
    pub fn new(agent_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            enabled,
            agent_name: agent_name.into(),
            knowledge_base_id: None,
            data_source_id: None,
            status: OverallStatus::Skipped,
            storage_backend: None,
            storage: None,
            ingestion: IngestionOutcome::skipped(),
            agent_associated: false,
            agent_id: None,
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub fn with_storage(&mut self, handle: &VectorStorageHandle) {
        self.storage_backend = Some(handle.backend_kind());
        self.storage = Some(handle.clone());
    }

    /// Mark the run failed, keeping whatever was provisioned before the error
    pub fn into_failure(mut self, source: DomainError) -> ProvisioningFailure {
        self.status = OverallStatus::Error;
        self.error = Some(source.to_string());
        self.completed_at = Utc::now();
        ProvisioningFailure {
            result: Box::new(self),
            source,
        }
    }

    pub fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }
}

/// A fatal setup failure, carrying the `error` result so it can still be written
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ProvisioningFailure {
    pub result: Box<ProvisioningResult>,
    pub source: DomainError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ingestion::IngestionJobStatus;

    fn job(status: IngestionJobStatus) -> IngestionJob {
        IngestionJob {
            id: "job-1".to_string(),
            knowledge_base_id: "kb".to_string(),
            data_source_id: "ds".to_string(),
            status,
            statistics: IngestionStatistics {
                documents_scanned: 10,
                documents_indexed: 9,
                documents_failed: 1,
                chunks_new: 40,
                chunks_modified: 2,
                chunks_deleted: 0,
            },
            failure_reasons: vec!["Access denied to s3://docs/a.pdf".to_string()],
        }
    }

    #[test]
    fn test_skipped_result_serialization() {
        let result = ProvisioningResult::new("support", false);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["enabled"], false);
        assert_eq!(json["status"], "skipped");
        assert!(json["knowledge_base_id"].is_null());
        assert_eq!(json["ingestion"]["status"], "skipped");
        assert_eq!(json["ingestion"]["documents_indexed"], 0);
        assert_eq!(json["agent_associated"], false);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_ingestion_status_strings() {
        let cases = [
            (IngestionOutcomeStatus::Skipped, "skipped"),
            (IngestionOutcomeStatus::Completed, "completed"),
            (IngestionOutcomeStatus::Failed, "failed"),
            (IngestionOutcomeStatus::TimedOut, "timed_out"),
            (IngestionOutcomeStatus::Error, "error"),
        ];
        for (status, expected) in cases {
            assert_eq!(serde_json::to_value(status).unwrap(), expected);
        }
    }

    #[test]
    fn test_completed_outcome_flattens_statistics() {
        let outcome = IngestionOutcome::completed(job(IngestionJobStatus::Complete));
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "completed");
        assert_eq!(json["job_id"], "job-1");
        assert_eq!(json["documents_scanned"], 10);
        assert_eq!(json["chunks_created"], 40);
        assert!(json.get("failure_reasons").is_none());
    }

    #[test]
    fn test_failed_outcome_keeps_reasons_verbatim() {
        let outcome = IngestionOutcome::failed(job(IngestionJobStatus::Failed));

        assert_eq!(outcome.status, IngestionOutcomeStatus::Failed);
        assert_eq!(
            outcome.failure_reasons,
            vec!["Access denied to s3://docs/a.pdf".to_string()]
        );
    }

    #[test]
    fn test_into_failure_keeps_partial_progress() {
        let mut result = ProvisioningResult::new("support", true);
        result.knowledge_base_id = Some("kb-1".to_string());

        let failure = result.into_failure(DomainError::provider("bedrock-agent", "throttled"));

        assert_eq!(failure.result.status, OverallStatus::Error);
        assert_eq!(failure.result.knowledge_base_id.as_deref(), Some("kb-1"));
        assert!(failure.result.error.as_deref().unwrap().contains("throttled"));
        assert!(failure.to_string().contains("throttled"));
    }
}
