//! Ingestion job records

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::polling::PollStatus;

/// Lifecycle status of an ingestion job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionJobStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
    Stopping,
    Stopped,
    Unknown(String),
}

impl IngestionJobStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "STARTING" => Self::Starting,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETE" => Self::Complete,
            "FAILED" => Self::Failed,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Terminal states in which the job will never complete
    pub fn failures() -> [Self; 2] {
        [Self::Failed, Self::Stopped]
    }
}

impl fmt::Display for IngestionJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "STARTING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
            Self::Stopping => write!(f, "STOPPING"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Unknown(value) => write!(f, "{}", value),
        }
    }
}

impl PollStatus for IngestionJobStatus {
    fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// Counters reported by an ingestion job
///
/// The managed service reports changes per document, not per chunk. The
/// `chunks_*` counters therefore count source documents whose chunks were
/// written, rewritten or removed; they are not chunk totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStatistics {
    pub documents_scanned: u64,
    pub documents_indexed: u64,
    pub documents_failed: u64,
    /// Documents whose chunks were indexed for the first time
    #[serde(rename = "chunks_created")]
    pub chunks_new: u64,
    /// Documents whose chunks were re-indexed after a change
    pub chunks_modified: u64,
    /// Documents whose chunks were removed from the index
    pub chunks_deleted: u64,
}

/// A single ingestion (sync) job of a data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionJob {
    pub id: String,
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub status: IngestionJobStatus,
    pub statistics: IngestionStatistics,
    pub failure_reasons: Vec<String>,
}
