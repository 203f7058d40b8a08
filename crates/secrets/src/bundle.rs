//! Trust bundle assembly
//!
//! During a `KeepOld` rotation of a CA, consumers must trust the outgoing and
//! the incoming certificate at once. The bundle concatenates the `Current`
//! certificate and, while it is still reported, the `Old` one. Once the
//! rotation completes the caller passes `IgnoreOldSecrets` and the bundle
//! narrows to `Current` only.

use crate::config::{BundleConfig, BundleSource};
use crate::core::{CredentialRecord, SecretsError, SecretsResult};

/// Build the bundle config of `base` from its retained generations.
///
/// The bundle's checksum is computed over these entries, so it changes
/// exactly when the bundle contents change.
pub(crate) fn assemble(
    base: &str,
    source: BundleSource,
    current: &CredentialRecord,
    old: Option<&CredentialRecord>,
) -> SecretsResult<BundleConfig> {
    let mut entries = Vec::with_capacity(2);
    for record in std::iter::once(current).chain(old) {
        let entry = record.get(source.source_key).ok_or_else(|| {
            SecretsError::materialization(
                base,
                format!("'{}' has no '{}' entry to bundle", record.name, source.source_key),
            )
        })?;
        entries.push(entry.to_vec());
    }

    Ok(BundleConfig {
        name: base.to_string(),
        data_key: source.bundle_key.to_string(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DATA_KEY_CERTIFICATE_BUNDLE, DATA_KEY_CERTIFICATE_CA};
    use crate::core::{GenerationClass, RecordData};

    const CA_SOURCE: BundleSource = BundleSource {
        source_key: DATA_KEY_CERTIFICATE_CA,
        bundle_key: DATA_KEY_CERTIFICATE_BUNDLE,
    };

    fn ca(name: &str, class: GenerationClass, pem: &str) -> CredentialRecord {
        let mut data = RecordData::new();
        data.insert(DATA_KEY_CERTIFICATE_CA.into(), pem.as_bytes().to_vec());
        CredentialRecord::new(name, class, data)
    }

    #[test]
    fn current_then_old() {
        let current = ca("ca-bbbb", GenerationClass::Current, "NEW\n");
        let old = ca("ca-old", GenerationClass::Old, "OLD\n");
        let bundle = assemble("ca", CA_SOURCE, &current, Some(&old)).unwrap();

        assert_eq!(bundle.name, "ca");
        assert_eq!(bundle.data_key, DATA_KEY_CERTIFICATE_BUNDLE);
        assert_eq!(bundle.contents(), b"NEW\nOLD\n".to_vec());
    }

    #[test]
    fn current_only() {
        let current = ca("ca-bbbb", GenerationClass::Current, "NEW\n");
        let bundle = assemble("ca", CA_SOURCE, &current, None).unwrap();
        assert_eq!(bundle.contents(), b"NEW\n".to_vec());
    }

    #[test]
    fn bundle_checksum_tracks_contents() {
        let current = ca("ca-bbbb", GenerationClass::Current, "NEW\n");
        let old = ca("ca-old", GenerationClass::Old, "OLD\n");
        let narrow = crate::config::SecretConfig::Bundle(assemble("ca", CA_SOURCE, &current, None).unwrap());
        let wide =
            crate::config::SecretConfig::Bundle(assemble("ca", CA_SOURCE, &current, Some(&old)).unwrap());
        assert_ne!(narrow.checksum(), wide.checksum());
    }

    #[test]
    fn missing_entry_fails() {
        let current = CredentialRecord::new("ca-bbbb", GenerationClass::Current, RecordData::new());
        assert!(matches!(
            assemble("ca", CA_SOURCE, &current, None),
            Err(SecretsError::MaterializationFailed { .. })
        ));
    }
}
