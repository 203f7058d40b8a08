//! Conflict retries with exponential backoff
//!
//! Writes are guarded by the store's version precondition. A writer that
//! loses a race re-reads current state, re-plans and tries again, up to
//! [`RetryPolicy::max_attempts`] times.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::core::{SecretsError, SecretsResult, StoreError};

/// Retry policy for conflicting writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,

    /// Backoff before the second attempt
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Growth factor between consecutive backoffs
    pub backoff_multiplier: f32,

    /// Upper bound for a single backoff
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Apply ±10% jitter
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt + 1` (zero-based).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as f32;
        let mut backoff_ms = base_ms * self.backoff_multiplier.powi(attempt as i32);
        if self.jitter {
            backoff_ms *= rand::rng().random_range(0.9..=1.1);
        }
        let backoff = Duration::from_millis(backoff_ms as u64);
        backoff.min(self.max_backoff)
    }

    /// Reject unusable policies.
    pub fn validate(&self) -> SecretsResult<()> {
        if self.max_attempts == 0 {
            return Err(SecretsError::invalid_config(
                "retry max_attempts must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(SecretsError::invalid_config(
                "retry backoff_multiplier must be a finite value >= 1.0",
            ));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(SecretsError::invalid_config(
                "retry initial_backoff cannot exceed max_backoff",
            ));
        }
        Ok(())
    }
}

/// Failure of one read-plan-write attempt.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// Lost a race against another writer; retried after a re-read
    Conflict(StoreError),
    /// Not retried
    Fatal(SecretsError),
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        // A record vanishing between read and update is a lost race as well.
        if err.is_conflict() || err.is_not_found() {
            Self::Conflict(err)
        } else {
            Self::Fatal(err.into())
        }
    }
}

impl From<SecretsError> for AttemptError {
    fn from(err: SecretsError) -> Self {
        Self::Fatal(err)
    }
}

/// Run `attempt` until it succeeds, fails fatally or conflicts
/// `policy.max_attempts` times.
pub(crate) async fn retry_on_conflict<F, Fut, T>(
    policy: &RetryPolicy,
    name: &str,
    mut attempt: F,
) -> SecretsResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut n = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => {
                tracing::error!(name = %name, error = %err, "rotation aborted");
                return Err(err);
            }
            Err(AttemptError::Conflict(err)) => {
                n += 1;
                tracing::warn!(
                    name = %name,
                    attempt = n,
                    max_attempts,
                    error = %err,
                    "write conflict"
                );
                if n >= max_attempts {
                    tracing::error!(name = %name, attempts = n, "retry budget exhausted");
                    return Err(SecretsError::RotationFailed {
                        name: name.to_string(),
                        attempts: n,
                        last_error: err,
                    });
                }
                let backoff = policy.backoff_duration(n - 1);
                tracing::debug!(name = %name, backoff_ms = backoff.as_millis() as u64, "backing off");
                sleep(backoff).await;
            }
        }
    }
}
