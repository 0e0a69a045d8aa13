//! Deterministic resource names derived from an agent name
//!
//! Names must be stable across runs: reuse of existing resources depends on
//! finding them again by name.

use sha2::{Digest, Sha256};

use super::validation::{validate_agent_name, KnowledgeBaseValidationError};

/// Bedrock limit for knowledge base and data source names
const BEDROCK_NAME_MAX: usize = 100;

/// OpenSearch Serverless limit for collection and policy names
const SEARCH_NAME_MAX: usize = 32;

/// S3 Vectors limit for bucket names
const VECTOR_BUCKET_NAME_MAX: usize = 63;

/// S3 Vectors limit for index names
const VECTOR_INDEX_NAME_MAX: usize = 63;

/// Hex characters of the agent name digest used to keep shortened names unique
const DIGEST_LEN: usize = 8;

/// Names of every remote resource provisioned for one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub agent: String,
    pub knowledge_base: String,
    pub data_source: String,
    pub vector_bucket: String,
    pub vector_index: String,
    pub collection: String,
    pub encryption_policy: String,
    pub network_policy: String,
    pub access_policy: String,
}

impl ResourceNames {
    /// Derive every name from the agent name
    ///
    /// Storage services only accept lower-case names, so storage names use a
    /// slug of the agent name. A slug that differs from the agent name, and
    /// any name cut to fit a service limit, carries a digest of the full
    /// agent name: two agents never share storage.
    pub fn derive(agent_name: &str, account_id: &str) -> Result<Self, KnowledgeBaseValidationError> {
        validate_agent_name(agent_name)?;

        let slug = agent_name.to_lowercase().replace('_', "-");
        let digest = name_digest(agent_name);
        let lossy_slug = slug != agent_name;

        let storage = |suffix: &str, max: usize| fit_name(&slug, suffix, max, &digest, lossy_slug);
        let bedrock = |suffix: &str| fit_name(agent_name, suffix, BEDROCK_NAME_MAX, &digest, false);

        Ok(Self {
            agent: agent_name.to_string(),
            knowledge_base: bedrock("kb"),
            data_source: bedrock("datasource"),
            vector_bucket: storage(&format!("vectors-{}", account_id), VECTOR_BUCKET_NAME_MAX),
            vector_index: storage("index", VECTOR_INDEX_NAME_MAX),
            collection: storage("kb", SEARCH_NAME_MAX),
            encryption_policy: storage("enc", SEARCH_NAME_MAX),
            network_policy: storage("net", SEARCH_NAME_MAX),
            access_policy: storage("access", SEARCH_NAME_MAX),
        })
    }
}

fn name_digest(agent_name: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(agent_name.as_bytes()));
    digest.truncate(DIGEST_LEN);
    digest
}

/// `{stem}-{suffix}`, or `{stem}-{digest}-{suffix}` with the stem cut so the
/// name fits `max` when the plain form is too long or `tagged` is set
fn fit_name(stem: &str, suffix: &str, max: usize, digest: &str, tagged: bool) -> String {
    let plain = format!("{}-{}", stem, suffix);
    if !tagged && plain.len() <= max {
        return plain;
    }

    let budget = max.saturating_sub(suffix.len() + digest.len() + 2);
    let stem = truncate_name(stem, budget);
    if stem.is_empty() {
        format!("{}-{}", digest, suffix)
    } else {
        format!("{}-{}-{}", stem, digest, suffix)
    }
}

fn truncate_name(name: &str, max: usize) -> String {
    let cut: String = name.chars().take(max).collect();
    cut.trim_end_matches(|c: char| c == '-' || c == '_').to_string()
}
