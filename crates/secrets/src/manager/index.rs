//! Per-run index of generated credentials

use std::collections::{HashMap, HashSet};

use crate::config::ConfigKind;
use crate::core::{CredentialRecord, GenerationClass};

/// Generations recorded for one base name.
#[derive(Debug, Clone)]
pub(crate) struct RunEntry {
    pub kind: ConfigKind,
    pub current: CredentialRecord,
    pub old: Option<CredentialRecord>,
    pub bundle: Option<CredentialRecord>,
}

impl RunEntry {
    pub fn class(&self, class: GenerationClass) -> Option<&CredentialRecord> {
        match class {
            GenerationClass::Current => Some(&self.current),
            GenerationClass::Old => self.old.as_ref(),
            GenerationClass::Bundle => self.bundle.as_ref(),
        }
    }

    fn records(&self) -> impl Iterator<Item = &CredentialRecord> {
        std::iter::once(&self.current)
            .chain(self.old.as_ref())
            .chain(self.bundle.as_ref())
    }
}

/// What `generate` produced since the last `start_run`.
#[derive(Debug, Default)]
pub(crate) struct RunIndex {
    entries: HashMap<String, RunEntry>,
}

impl RunIndex {
    pub fn record(&mut self, base: &str, entry: RunEntry) {
        self.entries.insert(base.to_string(), entry);
    }

    pub fn entry(&self, base: &str) -> Option<&RunEntry> {
        self.entries.get(base)
    }

    /// Current record of `base` if it was generated as `kind`.
    pub fn current_of_kind(&self, base: &str, kind: ConfigKind) -> Option<&CredentialRecord> {
        self.entries
            .get(base)
            .filter(|entry| entry.kind == kind)
            .map(|entry| &entry.current)
    }

    /// Names of every record generated or retained this run.
    pub fn in_use(&self) -> HashSet<String> {
        self.entries
            .values()
            .flat_map(RunEntry::records)
            .map(|record| record.name.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
