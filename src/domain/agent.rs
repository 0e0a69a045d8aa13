//! Conversational agents a knowledge base is associated with

/// Draft version every association targets
pub const DRAFT_AGENT_VERSION: &str = "DRAFT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub status: String,
}
