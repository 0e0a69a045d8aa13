//! Ingestion domain - sync jobs that embed source documents into a knowledge base

mod job;

pub use job::{IngestionJob, IngestionJobStatus, IngestionStatistics};
