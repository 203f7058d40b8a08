//! Store adapter boundary
//!
//! The engine talks to durable storage only through [`SecretStore`]: a
//! versioned key-object store with optimistic concurrency. Updates carry the
//! version the writer read; a mismatch is reported as
//! [`StoreError::Conflict`](crate::core::StoreError::Conflict) and the engine
//! re-reads and retries.

mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::labels::{LABEL_KEY_MANAGED_BY, LABEL_KEY_MANAGER_IDENTITY, LABEL_KEY_NAME, LABEL_VALUE_SECRETS_MANAGER};
use crate::core::{CredentialRecord, RecordVersion, StoreResult};

pub use memory::MemorySecretStore;

/// Label equality selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    labels: BTreeMap<String, String>,
}

impl Selector {
    /// Empty selector, matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key == value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// All records written by the manager `identity`.
    pub fn managed_by(identity: &str) -> Self {
        Self::new()
            .with(LABEL_KEY_MANAGED_BY, LABEL_VALUE_SECRETS_MANAGER)
            .with(LABEL_KEY_MANAGER_IDENTITY, identity)
    }

    /// All generations of `base` written by the manager `identity`.
    pub fn generations_of(base: &str, identity: &str) -> Self {
        Self::managed_by(identity).with(LABEL_KEY_NAME, base)
    }

    /// Required label pairs.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Whether `record` carries every required label.
    pub fn matches(&self, record: &CredentialRecord) -> bool {
        if self.labels.is_empty() {
            return true;
        }
        let actual = record.labels.to_label_map();
        self.labels
            .iter()
            .all(|(key, value)| actual.get(key) == Some(value))
    }
}

/// Versioned record store with optimistic concurrency.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Records matching `selector`.
    async fn list(&self, selector: &Selector) -> StoreResult<Vec<CredentialRecord>>;

    /// Record by exact name; `NotFound` if absent.
    async fn get(&self, name: &str) -> StoreResult<CredentialRecord>;

    /// Create a record; `AlreadyExists` if the name is taken. Returns the
    /// record as stored, with its assigned version.
    async fn create(&self, record: CredentialRecord) -> StoreResult<CredentialRecord>;

    /// Replace a record if its stored version equals `expected`; `Conflict`
    /// otherwise. Immutable records only accept label changes.
    async fn update(
        &self,
        record: CredentialRecord,
        expected: RecordVersion,
    ) -> StoreResult<CredentialRecord>;

    /// Delete a record; `NotFound` if absent.
    async fn delete(&self, name: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GenerationClass, RecordData, RecordLabels};

    #[test]
    fn selector_matches_on_rendered_labels() {
        let record = CredentialRecord::new("ca-1a2b3c4d", GenerationClass::Current, RecordData::new())
            .with_labels(RecordLabels {
                name: "ca".into(),
                managed_by: LABEL_VALUE_SECRETS_MANAGER.into(),
                manager_identity: "gardenlet".into(),
                ..RecordLabels::default()
            });

        assert!(Selector::new().matches(&record));
        assert!(Selector::generations_of("ca", "gardenlet").matches(&record));
        assert!(!Selector::generations_of("ca", "other").matches(&record));
        assert!(!Selector::generations_of("ca-client", "gardenlet").matches(&record));
    }
}
