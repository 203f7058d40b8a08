//! In-memory record store

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{SecretStore, Selector};
use crate::core::{CredentialRecord, RecordVersion, StoreError, StoreResult};

/// Reference [`SecretStore`] backed by a concurrent map.
///
/// Versions come from one store-wide counter, so they increase monotonically
/// across all records. Write counting and fault injection make it usable as a
/// test double.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    records: DashMap<String, CredentialRecord>,
    last_version: AtomicU64,
    writes: AtomicU32,
    injected_conflicts: AtomicU32,
    failing_deletes: DashMap<String, ()>,
    unavailable: AtomicBool,
}

impl MemorySecretStore {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a record without counting a write, e.g. one left by an older
    /// deployment. Returns the stored record.
    pub fn insert(&self, mut record: CredentialRecord) -> CredentialRecord {
        record.version = self.next_version();
        self.records.insert(record.name.clone(), record.clone());
        record
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted record names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Record by name, bypassing fault injection.
    pub fn peek(&self, name: &str) -> Option<CredentialRecord> {
        self.records.get(name).map(|e| e.value().clone())
    }

    /// Successful creates, updates and deletes so far.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `n` creates or updates fail as if another writer won.
    pub fn inject_conflicts(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    /// Make every deletion of `name` fail with `Unavailable`.
    pub fn fail_deletes_of(&self, name: impl Into<String>) {
        self.failing_deletes.insert(name.into(), ());
    }

    /// Simulate a transport outage for all operations.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn next_version(&self) -> RecordVersion {
        RecordVersion(self.last_version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn list(&self, selector: &Selector) -> StoreResult<Vec<CredentialRecord>> {
        self.check_available()?;
        let mut records: Vec<CredentialRecord> = self
            .records
            .iter()
            .filter(|e| selector.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn get(&self, name: &str) -> StoreResult<CredentialRecord> {
        self.check_available()?;
        self.peek(name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })
    }

    async fn create(&self, mut record: CredentialRecord) -> StoreResult<CredentialRecord> {
        self.check_available()?;
        if self.take_injected_conflict() {
            return Err(StoreError::AlreadyExists { name: record.name });
        }
        match self.records.entry(record.name.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists { name: record.name }),
            Entry::Vacant(entry) => {
                record.version = self.next_version();
                entry.insert(record.clone());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(record)
            }
        }
    }

    async fn update(
        &self,
        mut record: CredentialRecord,
        expected: RecordVersion,
    ) -> StoreResult<CredentialRecord> {
        self.check_available()?;
        let Some(mut stored) = self.records.get_mut(&record.name) else {
            return Err(StoreError::NotFound { name: record.name });
        };
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict {
                name: record.name,
                expected: expected.0,
                actual: stored.version.0 + 1,
            });
        }
        if stored.version != expected {
            return Err(StoreError::Conflict {
                name: record.name,
                expected: expected.0,
                actual: stored.version.0,
            });
        }
        if stored.immutable && stored.data != record.data {
            return Err(StoreError::Immutable { name: record.name });
        }
        record.version = self.next_version();
        *stored = record.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.check_available()?;
        if self.failing_deletes.contains_key(name) {
            return Err(StoreError::Unavailable {
                reason: format!("injected delete failure for '{name}'"),
            });
        }
        self.records
            .remove(name)
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
