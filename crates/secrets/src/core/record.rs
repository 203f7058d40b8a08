//! Materialized credential records

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::labels::RecordLabels;
use crate::config::ConfigKind;
use crate::naming::class_of;

/// Payload of a record: data key → raw bytes.
pub type RecordData = BTreeMap<String, Vec<u8>>;

/// Which generation of a rotating credential a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationClass {
    /// The single active generation
    Current,
    /// At most one retained prior generation
    Old,
    /// Aggregate derived from `Current` and `Old`
    Bundle,
}

impl GenerationClass {
    /// Lowercase name, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Old => "old",
            Self::Bundle => "bundle",
        }
    }
}

impl fmt::Display for GenerationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store version of a record; `0` means "never written".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordVersion(pub u64);

impl fmt::Display for RecordVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A materialized credential as held by the store.
///
/// The payload is immutable once written; only labels may change afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Derived external identifier
    pub name: String,
    /// Generation class
    pub class: GenerationClass,
    /// Kind of the originating config; `None` for records this engine did not write
    pub kind: Option<ConfigKind>,
    /// Provenance labels
    pub labels: RecordLabels,
    /// Raw payload
    pub data: RecordData,
    /// Payload may not change once set
    pub immutable: bool,
    /// Store version, assigned by the store
    pub version: RecordVersion,
}

impl CredentialRecord {
    /// Unsaved record with the given name, class and payload.
    pub fn new(name: impl Into<String>, class: GenerationClass, data: RecordData) -> Self {
        Self {
            name: name.into(),
            class,
            kind: None,
            labels: RecordLabels::default(),
            data,
            immutable: true,
            version: RecordVersion::default(),
        }
    }

    /// Rebuild a record from its wire form: external name, label map and
    /// payload, e.g. when a store adapter reads objects it did not cache.
    ///
    /// The class follows from the `-old` / `-bundle` suffix of the name
    /// relative to the `name` label. The kind is not part of the wire labels
    /// and stays `None`; the planner treats such a record as reusable when its
    /// checksum matches and relabels it with the generating kind. Adapters
    /// that can persist the kind alongside the object should set it with
    /// [`with_kind`](Self::with_kind).
    pub fn from_wire(
        name: impl Into<String>,
        labels: &BTreeMap<String, String>,
        data: RecordData,
    ) -> Self {
        let name = name.into();
        let labels = RecordLabels::from_label_map(labels);
        let class = if labels.name.is_empty() {
            GenerationClass::Current
        } else {
            class_of(&name, &labels.name)
        };
        Self::new(name, class, data).with_labels(labels)
    }

    /// Set the originating kind.
    pub fn with_kind(mut self, kind: ConfigKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the labels.
    pub fn with_labels(mut self, labels: RecordLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Payload value for `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Base name this record belongs to.
    pub fn base_name(&self) -> &str {
        &self.labels.name
    }
}

// Payload bytes are secret; only the keys are printed.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("kind", &self.kind)
            .field("labels", &self.labels)
            .field("data_keys", &self.data.keys().collect::<Vec<_>>())
            .field("immutable", &self.immutable)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_payload() {
        let mut data = RecordData::new();
        data.insert("password".into(), b"hunter2".to_vec());
        let record = CredentialRecord::new("basic-auth-1234abcd", GenerationClass::Current, data);

        let printed = format!("{record:?}");
        assert!(printed.contains("password"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn new_records_are_immutable_and_unsaved() {
        let record = CredentialRecord::new("x", GenerationClass::Old, RecordData::new());
        assert!(record.immutable);
        assert_eq!(record.version, RecordVersion(0));
        assert_eq!(record.class.to_string(), "old");
    }

    fn wire_labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn wire_records_take_class_from_name_suffix() {
        let labels = wire_labels(&[("name", "ca"), ("managed-by", "secrets-manager")]);

        let old = CredentialRecord::from_wire("ca-old", &labels, RecordData::new());
        let bundle = CredentialRecord::from_wire("ca-bundle", &labels, RecordData::new());
        let current = CredentialRecord::from_wire("ca-0a1b2c3d", &labels, RecordData::new());

        assert_eq!(old.class, GenerationClass::Old);
        assert_eq!(bundle.class, GenerationClass::Bundle);
        assert_eq!(current.class, GenerationClass::Current);
        assert_eq!(current.kind, None);
        assert_eq!(current.labels.name, "ca");
        assert!(current.labels.is_managed());
    }

    #[test]
    fn unlabeled_wire_record_is_current() {
        let record = CredentialRecord::from_wire("legacy-old", &BTreeMap::new(), RecordData::new());
        assert_eq!(record.class, GenerationClass::Current);
        assert!(!record.labels.is_managed());
    }
}
