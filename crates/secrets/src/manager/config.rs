//! Configuration for the secrets manager

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{SecretsError, SecretsResult};
use crate::rotation::RetryPolicy;

/// Configuration for [`SecretsManager`](super::SecretsManager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Identity stamped on every record; cleanup only touches records with
    /// the same identity
    pub identity: String,

    /// Retry policy for conflicting writes
    pub retry: RetryPolicy,

    /// CA base names that keep checksum-based naming even when the legacy
    /// checksum-free naming is requested
    pub legacy_naming_exempt: BTreeSet<String>,

    /// Externally decided rotation start per base name. Changing it forces a
    /// new generation.
    pub last_rotation_initiation_times: BTreeMap<String, DateTime<Utc>>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            identity: "secrets-manager".to_string(),
            retry: RetryPolicy::default(),
            legacy_naming_exempt: BTreeSet::new(),
            last_rotation_initiation_times: BTreeMap::new(),
        }
    }
}

impl ManagerConfig {
    /// Config with the given identity and defaults otherwise.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    /// Exempt a CA base name from legacy naming.
    pub fn exempt_from_legacy_naming(mut self, base: impl Into<String>) -> Self {
        self.legacy_naming_exempt.insert(base.into());
        self
    }

    /// Record the start of a rotation for `base`.
    pub fn with_last_rotation_initiation_time(
        mut self,
        base: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        self.last_rotation_initiation_times.insert(base.into(), time);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `last-rotation-initiation-time` label value for `base`: unix seconds,
    /// or empty if no rotation was initiated.
    pub fn rotation_time_label(&self, base: &str) -> String {
        self.last_rotation_initiation_times
            .get(base)
            .map(|time| time.timestamp().to_string())
            .unwrap_or_default()
    }

    /// Reject unusable configuration before any store access.
    pub fn validate(&self) -> SecretsResult<()> {
        if self.identity.is_empty() {
            return Err(SecretsError::invalid_config("manager identity cannot be empty"));
        }
        self.retry.validate()
    }
}
