//! Ingestion job runner for knowledge base data sources

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::domain::ingestion::{IngestionJob, IngestionJobStatus};
use crate::domain::knowledge_base::KnowledgeBaseClient;
use crate::domain::polling::{poll_until, PollError, PollPolicy};
use crate::domain::provisioning::IngestionOutcome;
use crate::domain::DomainError;

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Starts one ingestion job and follows it to completion or timeout
///
/// Failures and timeouts are recorded in the returned outcome rather than
/// raised: documents are re-synced on the next run. A timed-out job keeps
/// running remotely.
pub struct IngestionRunner {
    client: Arc<dyn KnowledgeBaseClient>,
    poll_interval: Duration,
    description: String,
}

impl fmt::Debug for IngestionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionRunner")
            .field("poll_interval", &self.poll_interval)
            .field("description", &self.description)
            .finish()
    }
}

impl IngestionRunner {
    pub fn new(client: Arc<dyn KnowledgeBaseClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
            description: "Automatic document sync".to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub async fn run(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        timeout: Duration,
    ) -> IngestionOutcome {
        let started = Instant::now();

        let job = match self
            .client
            .start_ingestion_job(knowledge_base_id, data_source_id, &self.description)
            .await
        {
            Ok(job) => job,
            Err(e) => {
                error!(knowledge_base_id, data_source_id, error = %e, "Failed to start ingestion job");
                counter!("kb_ingestion_jobs_total", "outcome" => "error").increment(1);
                return IngestionOutcome::error(None, &e);
            }
        };

        let job_id = job.id.clone();
        info!(
            knowledge_base_id,
            data_source_id,
            job_id = %job_id,
            timeout_secs = timeout.as_secs(),
            "Started ingestion job"
        );

        let resource = format!("ingestion job '{}'", job_id);
        let last_progress = Mutex::new(started);
        let outcome = poll_until(
            &resource,
            || async {
                let job = self
                    .client
                    .get_ingestion_job(knowledge_base_id, data_source_id, &job_id)
                    .await?;
                log_progress(&job, &last_progress, started);
                Ok::<_, DomainError>(job)
            },
            |job: &IngestionJob| job.status.clone(),
            &IngestionJobStatus::Complete,
            &IngestionJobStatus::failures(),
            &PollPolicy::new(self.poll_interval, timeout),
        )
        .await;

        histogram!("kb_ingestion_duration_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(job) => {
                let stats = job.statistics;
                info!(
                    job_id = %job.id,
                    documents_scanned = stats.documents_scanned,
                    documents_indexed = stats.documents_indexed,
                    documents_failed = stats.documents_failed,
                    chunks_new = stats.chunks_new,
                    chunks_modified = stats.chunks_modified,
                    chunks_deleted = stats.chunks_deleted,
                    "Ingestion completed"
                );
                counter!("kb_ingestion_jobs_total", "outcome" => "completed").increment(1);
                counter!("kb_ingestion_documents_total", "result" => "indexed")
                    .increment(stats.documents_indexed);
                counter!("kb_ingestion_documents_total", "result" => "failed")
                    .increment(stats.documents_failed);
                IngestionOutcome::completed(job)
            }
            Err(PollError::TerminalFailure { last }) => {
                let failure = DomainError::terminal_failure(
                    &resource,
                    last.status.to_string(),
                    last.failure_reasons.clone(),
                );
                error!(job_id = %last.id, error = %failure, "Ingestion job failed");
                counter!("kb_ingestion_jobs_total", "outcome" => "failed").increment(1);
                let mut outcome = IngestionOutcome::failed(last);
                outcome.error = Some(failure.to_string());
                outcome
            }
            Err(timeout @ PollError::Timeout { .. }) => {
                let error = timeout.into_domain_error(
                    &resource,
                    |job: &IngestionJob| job.status.clone(),
                    |job| job.failure_reasons,
                );
                warn!(job_id = %job_id, error = %error, "Ingestion job still running after timeout");
                counter!("kb_ingestion_jobs_total", "outcome" => "timed_out").increment(1);
                IngestionOutcome::timed_out(Some(job_id), &error)
            }
            Err(PollError::Lookup(e)) => {
                error!(job_id = %job_id, error = %e, "Failed to read ingestion job status");
                counter!("kb_ingestion_jobs_total", "outcome" => "error").increment(1);
                IngestionOutcome::error(Some(job_id), &e)
            }
        }
    }
}

fn log_progress(job: &IngestionJob, last_logged: &Mutex<Instant>, started: Instant) {
    let Ok(mut last_logged) = last_logged.lock() else {
        return;
    };
    if last_logged.elapsed() >= PROGRESS_LOG_INTERVAL {
        info!(
            job_id = %job.id,
            status = %job.status,
            elapsed_secs = started.elapsed().as_secs(),
            "Ingestion in progress"
        );
        *last_logged = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::domain::ingestion::IngestionStatistics;
    use crate::domain::knowledge_base::MockKnowledgeBaseClient;
    use crate::domain::provisioning::IngestionOutcomeStatus;

    fn runner(client: Arc<MockKnowledgeBaseClient>) -> IngestionRunner {
        IngestionRunner::new(client, Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_job_reports_statistics() {
        let stats = IngestionStatistics {
            documents_scanned: 12,
            documents_indexed: 12,
            documents_failed: 0,
            chunks_new: 48,
            chunks_modified: 0,
            chunks_deleted: 0,
        };
        let client = Arc::new(
            MockKnowledgeBaseClient::new()
                .with_job_statuses(vec![
                    IngestionJobStatus::InProgress,
                    IngestionJobStatus::InProgress,
                    IngestionJobStatus::Complete,
                ])
                .with_job_statistics(stats),
        );
        let started = Instant::now();

        let outcome = runner(client.clone())
            .run("kb-1", "ds-1", Duration::from_secs(1800))
            .await;

        assert_eq!(outcome.status, IngestionOutcomeStatus::Completed);
        assert_eq!(outcome.job_id.as_deref(), Some("job-1"));
        assert_eq!(outcome.statistics, stats);
        assert_eq!(client.ingestion_starts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_keeps_reasons_verbatim() {
        let reasons = vec![
            "Encountered error: The S3 bucket does not exist".to_string(),
            "Some documents could not be parsed".to_string(),
        ];
        let client = Arc::new(
            MockKnowledgeBaseClient::new()
                .with_job_statuses(vec![
                    IngestionJobStatus::Starting,
                    IngestionJobStatus::Failed,
                ])
                .with_job_failure_reasons(reasons.clone()),
        );

        let outcome = runner(client)
            .run("kb-1", "ds-1", Duration::from_secs(1800))
            .await;

        assert_eq!(outcome.status, IngestionOutcomeStatus::Failed);
        assert_eq!(outcome.failure_reasons, reasons);
        assert!(outcome.error.unwrap().contains("The S3 bucket does not exist"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_job_is_a_failure() {
        let client = Arc::new(
            MockKnowledgeBaseClient::new().with_job_statuses(vec![IngestionJobStatus::Stopped]),
        );

        let outcome = runner(client)
            .run("kb-1", "ds-1", Duration::from_secs(60))
            .await;

        assert_eq!(outcome.status, IngestionOutcomeStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recorded_not_raised() {
        let client = Arc::new(
            MockKnowledgeBaseClient::new().with_job_statuses(vec![IngestionJobStatus::InProgress]),
        );
        let started = Instant::now();

        let outcome = runner(client.clone())
            .run("kb-1", "ds-1", Duration::from_secs(30))
            .await;

        assert_eq!(outcome.status, IngestionOutcomeStatus::TimedOut);
        assert_eq!(outcome.job_id.as_deref(), Some("job-1"));
        assert!(outcome.error.unwrap().contains("IN_PROGRESS"));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        // polls at 0, 10, 20 and 30 seconds; no restart
        assert_eq!(client.job_lookups(), 4);
        assert_eq!(client.ingestion_starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job_status_keeps_polling() {
        let client = Arc::new(MockKnowledgeBaseClient::new().with_job_statuses(vec![
            IngestionJobStatus::Unknown("QUEUED".to_string()),
            IngestionJobStatus::Complete,
        ]));

        let outcome = runner(client.clone())
            .run("kb-1", "ds-1", Duration::from_secs(300))
            .await;

        assert_eq!(outcome.status, IngestionOutcomeStatus::Completed);
        assert_eq!(client.job_lookups(), 2);
    }
}
