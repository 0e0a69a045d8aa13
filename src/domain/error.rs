use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    /// The remote service reported a terminal failure state
    #[error("{resource} reached terminal state {state}: {}", format_reasons(.reasons))]
    TerminalFailure {
        resource: String,
        state: String,
        reasons: Vec<String>,
    },

    /// A wait budget ran out before the target or a terminal state was observed
    #[error("Timed out after {waited_secs}s waiting for {resource} (last state: {last_state})")]
    Timeout {
        resource: String,
        last_state: String,
        waited_secs: u64,
    },

    /// Both vector storage backends failed to provision
    #[error("All vector storage backends failed: primary: {primary}; fallback: {fallback}")]
    BackendExhausted {
        primary: Box<DomainError>,
        fallback: Box<DomainError>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_reasons(reasons: &[String]) -> String {
    if reasons.is_empty() {
        "no failure reasons reported".to_string()
    } else {
        reasons.join("; ")
    }
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn terminal_failure(
        resource: impl Into<String>,
        state: impl Into<String>,
        reasons: Vec<String>,
    ) -> Self {
        Self::TerminalFailure {
            resource: resource.into(),
            state: state.into(),
            reasons,
        }
    }

    pub fn timeout(
        resource: impl Into<String>,
        last_state: impl Into<String>,
        waited_secs: u64,
    ) -> Self {
        Self::Timeout {
            resource: resource.into(),
            last_state: last_state.into(),
            waited_secs,
        }
    }

    pub fn backend_exhausted(primary: DomainError, fallback: DomainError) -> Self {
        Self::BackendExhausted {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
