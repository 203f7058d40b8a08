//! Provenance labels attached to every managed record
//!
//! The label *keys* are a wire contract with external inspection tooling, so
//! they are fixed constants. Inside the engine the labels travel as the
//! structured [`RecordLabels`] side record; the string map is only produced at
//! the edge via [`RecordLabels::to_label_map`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rotation::RotationStrategy;

/// Label key: base logical name
pub const LABEL_KEY_NAME: &str = "name";
/// Label key: owner marker
pub const LABEL_KEY_MANAGED_BY: &str = "managed-by";
/// Label key: identity of the manager instance that owns the record
pub const LABEL_KEY_MANAGER_IDENTITY: &str = "manager-identity";
/// Label key: checksum of the config the payload was generated from
pub const LABEL_KEY_CHECKSUM_OF_CONFIG: &str = "checksum-of-config";
/// Label key: unix seconds of the last rotation initiation (empty if none)
pub const LABEL_KEY_LAST_ROTATION_INITIATION_TIME: &str = "last-rotation-initiation-time";
/// Label key: rotation strategy in effect when the record was written
pub const LABEL_KEY_ROTATION_STRATEGY: &str = "rotation-strategy";
/// Label key: exempts the record from garbage collection
pub const LABEL_KEY_PERSIST: &str = "persist";
/// Label key: checksum of the signing CA payload (signed certificates only)
pub const LABEL_KEY_CHECKSUM_OF_SIGNING_CA: &str = "checksum-of-signing-ca";

/// Value of [`LABEL_KEY_MANAGED_BY`] on every record this engine writes
pub const LABEL_VALUE_SECRETS_MANAGER: &str = "secrets-manager";

/// Structured provenance of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLabels {
    /// Base logical name, stable across rotations
    pub name: String,
    /// Owner marker, [`LABEL_VALUE_SECRETS_MANAGER`] for managed records
    pub managed_by: String,
    /// Identity of the owning manager
    pub manager_identity: String,
    /// Checksum of the generating config
    pub checksum_of_config: String,
    /// Unix seconds of the last rotation initiation, or empty
    pub last_rotation_initiation_time: String,
    /// Strategy the record was written under
    pub rotation_strategy: Option<RotationStrategy>,
    /// Exempt from cleanup
    pub persist: bool,
    /// Checksum of the signing CA payload, for signed certificates
    pub checksum_of_signing_ca: Option<String>,
}

impl RecordLabels {
    /// Whether a manager wrote these labels.
    pub fn is_managed(&self) -> bool {
        self.managed_by == LABEL_VALUE_SECRETS_MANAGER
    }

    /// Render the wire label map.
    ///
    /// Managed records always carry the six provenance keys (the rotation time
    /// may be an empty string); `persist` appears only when set.
    pub fn to_label_map(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        let mut put = |key: &str, value: &str, always: bool| {
            if always || !value.is_empty() {
                labels.insert(key.to_string(), value.to_string());
            }
        };

        let managed = self.is_managed();
        put(LABEL_KEY_NAME, &self.name, managed);
        put(LABEL_KEY_MANAGED_BY, &self.managed_by, managed);
        put(LABEL_KEY_MANAGER_IDENTITY, &self.manager_identity, managed);
        put(LABEL_KEY_CHECKSUM_OF_CONFIG, &self.checksum_of_config, managed);
        put(
            LABEL_KEY_LAST_ROTATION_INITIATION_TIME,
            &self.last_rotation_initiation_time,
            managed,
        );
        if let Some(strategy) = self.rotation_strategy {
            put(LABEL_KEY_ROTATION_STRATEGY, strategy.as_label_value(), true);
        }
        if self.persist {
            put(LABEL_KEY_PERSIST, "true", true);
        }
        if let Some(checksum) = &self.checksum_of_signing_ca {
            put(LABEL_KEY_CHECKSUM_OF_SIGNING_CA, checksum, false);
        }

        labels
    }

    /// Rebuild labels from a wire label map. Unknown keys are ignored.
    ///
    /// Store adapters read records back through
    /// [`CredentialRecord::from_wire`](crate::core::CredentialRecord::from_wire),
    /// which also recovers the generation class.
    pub fn from_label_map(labels: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| labels.get(key).cloned().unwrap_or_default();

        Self {
            name: get(LABEL_KEY_NAME),
            managed_by: get(LABEL_KEY_MANAGED_BY),
            manager_identity: get(LABEL_KEY_MANAGER_IDENTITY),
            checksum_of_config: get(LABEL_KEY_CHECKSUM_OF_CONFIG),
            last_rotation_initiation_time: get(LABEL_KEY_LAST_ROTATION_INITIATION_TIME),
            rotation_strategy: labels
                .get(LABEL_KEY_ROTATION_STRATEGY)
                .and_then(|value| RotationStrategy::from_label_value(value)),
            persist: labels.get(LABEL_KEY_PERSIST).is_some_and(|v| v == "true"),
            checksum_of_signing_ca: labels.get(LABEL_KEY_CHECKSUM_OF_SIGNING_CA).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn managed() -> RecordLabels {
        RecordLabels {
            name: "config".into(),
            managed_by: LABEL_VALUE_SECRETS_MANAGER.into(),
            manager_identity: "test".into(),
            checksum_of_config: "17492942871593004096".into(),
            last_rotation_initiation_time: String::new(),
            rotation_strategy: Some(RotationStrategy::InPlace),
            persist: true,
            checksum_of_signing_ca: None,
        }
    }

    #[test]
    fn managed_labels_render_the_wire_contract() {
        let map = managed().to_label_map();
        let expected: BTreeMap<String, String> = [
            ("name", "config"),
            ("managed-by", "secrets-manager"),
            ("manager-identity", "test"),
            ("checksum-of-config", "17492942871593004096"),
            ("last-rotation-initiation-time", ""),
            ("rotation-strategy", "inplace"),
            ("persist", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn persist_key_absent_unless_set() {
        let mut labels = managed();
        labels.persist = false;
        assert!(!labels.to_label_map().contains_key(LABEL_KEY_PERSIST));
    }

    #[test]
    fn unmanaged_labels_render_only_present_values() {
        let labels = RecordLabels {
            name: "legacy".into(),
            ..RecordLabels::default()
        };
        let map = labels.to_label_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("name").map(String::as_str), Some("legacy"));
    }

    #[test]
    fn label_map_round_trips() {
        let mut labels = managed();
        labels.checksum_of_signing_ca = Some("42".into());
        labels.rotation_strategy = Some(RotationStrategy::KeepOld);
        assert_eq!(RecordLabels::from_label_map(&labels.to_label_map()), labels);
    }
}
