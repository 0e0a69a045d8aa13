//! Input of one provisioning run

use std::time::Duration;

use crate::domain::knowledge_base::{ChunkingPolicy, SourceLocation};

/// Default budget for an ingestion job
pub const DEFAULT_INGESTION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Everything the caller decides about one provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub agent_name: String,
    pub source: SourceLocation,
    pub chunking: ChunkingPolicy,
    pub skip_ingestion: bool,
    pub ingestion_timeout: Duration,
    /// When false the run is a no-op that still reports a `skipped` result
    pub enabled: bool,
}

impl ProvisionRequest {
    pub fn new(agent_name: impl Into<String>, source: SourceLocation) -> Self {
        Self {
            agent_name: agent_name.into(),
            source,
            chunking: ChunkingPolicy::default(),
            skip_ingestion: false,
            ingestion_timeout: DEFAULT_INGESTION_TIMEOUT,
            enabled: true,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingPolicy) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_skip_ingestion(mut self, skip: bool) -> Self {
        self.skip_ingestion = skip;
        self
    }

    pub fn with_ingestion_timeout(mut self, timeout: Duration) -> Self {
        self.ingestion_timeout = timeout;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
