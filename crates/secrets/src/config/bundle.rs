//! Bundle aggregates

use serde::{Deserialize, Serialize};

use crate::core::{RecordData, SecretsError, SecretsResult};

/// Ordered entries concatenated under a single payload key.
///
/// Built by the bundle assembler from the retained generations of a base name;
/// callers do not construct these directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Name of the bundle record's base, `<base>-bundle`
    pub name: String,
    /// Payload key of the concatenation
    pub data_key: String,
    /// Entries, newest first
    pub entries: Vec<Vec<u8>>,
}

impl BundleConfig {
    pub(super) fn validate(&self) -> SecretsResult<()> {
        if self.data_key.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "bundle '{}' needs a data key",
                self.name
            )));
        }
        Ok(())
    }

    /// Concatenation of all entries, each newline-terminated.
    pub fn contents(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.iter().map(|e| e.len() + 1).sum());
        for entry in &self.entries {
            out.extend_from_slice(entry);
            if !entry.ends_with(b"\n") {
                out.push(b'\n');
            }
        }
        out
    }

    pub(super) fn materialize(&self) -> RecordData {
        let mut data = RecordData::new();
        data.insert(self.data_key.clone(), self.contents());
        data
    }
}
