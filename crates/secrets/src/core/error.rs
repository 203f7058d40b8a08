//! Error types for credential lifecycle operations
//!
//! Two tiers:
//! - [`StoreError`]: what the backing store adapter reports (not found,
//!   already exists, version conflict, transport failure)
//! - [`SecretsError`]: what `generate` / `bundle` / `cleanup` report to the
//!   orchestrator
//!
//! Store errors convert into [`SecretsError`] via `From`, so the engine can use
//! `?` on adapter calls. Conflicts never reach callers directly: the rotation
//! engine retries them and reports [`SecretsError::RotationFailed`] once its
//! retry budget is spent.
//!
//! ```
//! use keyward_secrets::core::{SecretsError, StoreError};
//!
//! let err: SecretsError = StoreError::Unavailable {
//!     reason: "connection reset".to_string(),
//! }
//! .into();
//! assert!(matches!(err, SecretsError::StoreUnavailable { .. }));
//! ```

use thiserror::Error;

/// Errors reported by a [`SecretStore`](crate::store::SecretStore) adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No record with that name
    #[error("record '{name}' not found")]
    NotFound {
        /// Record name
        name: String,
    },

    /// A record with that name already exists
    #[error("record '{name}' already exists")]
    AlreadyExists {
        /// Record name
        name: String,
    },

    /// Optimistic-concurrency precondition failed
    #[error("version conflict on record '{name}': expected {expected}, found {actual}")]
    Conflict {
        /// Record name
        name: String,
        /// Version the writer expected
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Attempt to change the payload of an immutable record
    #[error("record '{name}' is immutable")]
    Immutable {
        /// Record name
        name: String,
    },

    /// Transport-level failure talking to the store
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Description of the failure
        reason: String,
    },
}

impl StoreError {
    /// Whether a re-read-then-write retry can resolve this error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }

    /// Whether this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// One failed deletion reported by `cleanup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Record that could not be deleted
    pub name: String,
    /// Why the deletion failed
    pub error: StoreError,
}

impl std::fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

/// Top-level error for the credential lifecycle engine.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// Config or manager configuration is not usable
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong
        reason: String,
    },

    /// A config depends on a credential that was not generated in this run
    #[error("dependency '{dependency}' of '{name}' is missing")]
    DependencyMissing {
        /// Base name of the config being generated
        name: String,
        /// Base name of the missing dependency
        dependency: String,
    },

    /// Key or certificate generation failed
    #[error("failed to materialize '{name}': {reason}")]
    MaterializationFailed {
        /// Base name of the config
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Concurrent writers kept winning until the retry budget was spent
    #[error("rotation of '{name}' failed after {attempts} attempts: {last_error}")]
    RotationFailed {
        /// Base name of the config
        name: String,
        /// Attempts made
        attempts: u32,
        /// Last conflict observed
        last_error: StoreError,
    },

    /// The store could not be reached or rejected the request
    #[error("store error: {source}")]
    StoreUnavailable {
        /// Underlying adapter error
        #[source]
        source: StoreError,
    },

    /// Nothing was generated for this base name in the current run
    #[error("no credential named '{name}' was generated in this run")]
    NotFound {
        /// Base name looked up
        name: String,
    },

    /// Some deletions of a cleanup pass failed; the others were applied
    #[error("cleanup failed for {} record(s): {}", failures.len(), join_failures(failures))]
    CleanupFailed {
        /// Every failed deletion
        failures: Vec<CleanupFailure>,
    },
}

fn join_failures(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SecretsError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn materialization(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::MaterializationFailed {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<StoreError> for SecretsError {
    fn from(source: StoreError) -> Self {
        Self::StoreUnavailable { source }
    }
}

/// Result alias for store adapter calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for engine operations
pub type SecretsResult<T> = Result<T, SecretsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn conflict_classification() {
        let conflict = StoreError::Conflict {
            name: "ca".into(),
            expected: 1,
            actual: 2,
        };
        assert!(conflict.is_conflict());
        assert!(
            StoreError::AlreadyExists {
                name: "ca".into()
            }
            .is_conflict()
        );
        assert!(
            !StoreError::Unavailable {
                reason: "down".into()
            }
            .is_conflict()
        );
        assert!(StoreError::NotFound { name: "ca".into() }.is_not_found());
    }

    #[test]
    fn store_error_converts_with_source() {
        let err: SecretsError = StoreError::Unavailable {
            reason: "timeout".into(),
        }
        .into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn cleanup_failed_lists_every_record() {
        let err = SecretsError::CleanupFailed {
            failures: vec![
                CleanupFailure {
                    name: "a".into(),
                    error: StoreError::Unavailable {
                        reason: "boom".into(),
                    },
                },
                CleanupFailure {
                    name: "b".into(),
                    error: StoreError::Unavailable {
                        reason: "bang".into(),
                    },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 record(s)"));
        assert!(msg.contains("a: store unavailable: boom"));
        assert!(msg.contains("b: store unavailable: bang"));
    }
}
