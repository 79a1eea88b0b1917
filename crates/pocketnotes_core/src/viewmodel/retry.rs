//! Retry with exponential backoff for background persistence tasks.
//!
//! # Invariants
//! - At least one attempt is always made.
//! - The job learns its 1-based attempt number, so retries can re-check
//!   whether the write is still wanted.
//! - Store calls run on the blocking pool; cancellation wins over both a
//!   pending attempt and a pending backoff sleep.

use crate::store::{StoreError, StoreResult};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(1);

/// How often and how patiently a persistence task retries a failed store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before the attempt following failed attempt number `failed_attempt`
    /// (1-based).
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failed_attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

/// Outcome of a background persistence task that did not succeed.
#[derive(Debug)]
pub enum PersistError {
    /// Every attempt failed; `source` is the last store error.
    Store {
        op: &'static str,
        attempts: u32,
        source: StoreError,
    },
    /// The owning scope was cancelled before the task finished.
    Cancelled,
    /// The blocking store call panicked or was aborted.
    Aborted(String),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store {
                op,
                attempts,
                source,
            } => write!(f, "{op} failed after {attempts} attempt(s): {source}"),
            Self::Cancelled => write!(f, "persistence task cancelled"),
            Self::Aborted(details) => write!(f, "persistence task aborted: {details}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Runs `job(attempt)` on the blocking pool until it succeeds, the policy is
/// exhausted, or `cancel` fires.
pub async fn run_with_retry<T, F>(
    op: &'static str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    job: F,
) -> Result<T, PersistError>
where
    T: Send + 'static,
    F: Fn(u32) -> StoreResult<T> + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(PersistError::Cancelled);
        }
        let current = Arc::clone(&job);
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PersistError::Cancelled),
            joined = task::spawn_blocking(move || current(attempt)) => joined,
        };

        let err = match joined {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(join_err) => return Err(PersistError::Aborted(join_err.to_string())),
        };

        if attempt >= max_attempts {
            return Err(PersistError::Store {
                op,
                attempts: attempt,
                source: err,
            });
        }

        let delay = policy.backoff_for(attempt);
        warn!(
            "event=persist_retry module=viewmodel status=retry op={op} attempt={attempt} delay_ms={} error={err}",
            delay.as_millis()
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PersistError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
