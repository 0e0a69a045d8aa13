//! Poll-until-state primitive for asynchronous remote resources
//!
//! Every wait in the provisioning flow goes through [`poll_until`]: knowledge
//! base activation, collection activation, ingestion jobs and the fixed settle
//! delays (see [`settle`]). Sleeping uses `tokio::time`, so tests drive the
//! loop with a paused clock instead of waiting for real.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::DomainError;

/// Interval and total budget for a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }
}

/// A remote status value that can be polled
///
/// Status enums carry an `Unknown` variant for values the service may add
/// later; those report `false` from [`PollStatus::is_recognized`] and are
/// treated as transient.
pub trait PollStatus: Clone + PartialEq + fmt::Display + Send + Sync {
    fn is_recognized(&self) -> bool;
}

/// Why a poll loop stopped without reaching its target
#[derive(Debug)]
pub enum PollError<T> {
    /// The observed status is one of the terminal failure states
    TerminalFailure { last: T },
    /// The budget ran out; `last` is the final observation, if any was made
    Timeout { last: Option<T>, elapsed: Duration },
    /// The status lookup itself failed
    Lookup(DomainError),
}

impl<T> PollError<T> {
    /// Collapse into a [`DomainError`], naming the resource and its last state
    pub fn into_domain_error<S, P, R>(
        self,
        resource: &str,
        status_of: P,
        reasons_of: R,
    ) -> DomainError
    where
        S: fmt::Display,
        P: Fn(&T) -> S,
        R: FnOnce(T) -> Vec<String>,
    {
        match self {
            Self::TerminalFailure { last } => {
                let state = status_of(&last).to_string();
                DomainError::terminal_failure(resource, state, reasons_of(last))
            }
            Self::Timeout { last, elapsed } => DomainError::timeout(
                resource,
                last.as_ref()
                    .map(|observed| status_of(observed).to_string())
                    .unwrap_or_else(|| "unobserved".to_string()),
                elapsed.as_secs(),
            ),
            Self::Lookup(error) => error,
        }
    }
}

/// Poll `observe` until the projected status equals `target`
///
/// Terminal failure states are checked before the budget, so a resource that
/// is already failed always yields [`PollError::TerminalFailure`].
pub async fn poll_until<T, S, F, Fut, P>(
    resource: &str,
    mut observe: F,
    status_of: P,
    target: &S,
    failures: &[S],
    policy: &PollPolicy,
) -> Result<T, PollError<T>>
where
    S: PollStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
    P: Fn(&T) -> S,
{
    let started = Instant::now();
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        counter!("kb_poll_iterations_total", "resource" => resource_label(resource)).increment(1);

        let observed = observe().await.map_err(PollError::Lookup)?;
        let status = status_of(&observed);

        if &status == target {
            debug!(resource, status = %status, attempts, "Target state reached");
            return Ok(observed);
        }

        if failures.contains(&status) {
            warn!(resource, status = %status, attempts, "Terminal failure state observed");
            return Err(PollError::TerminalFailure { last: observed });
        }

        if status.is_recognized() {
            debug!(resource, status = %status, target = %target, "Waiting for target state");
        } else {
            warn!(
                resource,
                status = %status,
                "Unrecognized status, treating as transient"
            );
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Err(PollError::Timeout {
                last: Some(observed),
                elapsed,
            });
        }

        sleep(policy.interval.min(policy.timeout - elapsed)).await;
    }
}

/// Metric label for a resource description such as `knowledge base 'x-kb'`
fn resource_label(resource: &str) -> String {
    resource
        .split(" '")
        .next()
        .unwrap_or(resource)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettleState {
    Settling,
    Settled,
}

impl fmt::Display for SettleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settling => write!(f, "SETTLING"),
            Self::Settled => write!(f, "SETTLED"),
        }
    }
}

impl PollStatus for SettleState {
    fn is_recognized(&self) -> bool {
        true
    }
}

/// Wait a fixed settle delay for a resource that exposes no readiness signal
pub async fn settle(resource: &str, delay: Duration) {
    if delay.is_zero() {
        return;
    }

    info!(resource, delay_secs = delay.as_secs(), "Waiting for resource to settle");

    let policy = PollPolicy::new(delay, delay);
    let outcome = poll_until(
        resource,
        || async { Ok(SettleState::Settling) },
        |state| *state,
        &SettleState::Settled,
        &[],
        &policy,
    )
    .await;

    match outcome {
        Err(PollError::Timeout { elapsed, .. }) => {
            debug!(resource, elapsed_secs = elapsed.as_secs(), "Settle delay elapsed");
        }
        Ok(_) | Err(PollError::TerminalFailure { .. }) | Err(PollError::Lookup(_)) => {}
    }
}
