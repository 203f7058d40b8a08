//! Deterministic record naming
//!
//! A `Current` record is named `<base>-<hash>`, where `<hash>` is the first
//! eight hex digits of SHA-256 over the config checksum, the last rotation
//! initiation time and, for signed certificates, the signing CA's checksum.
//! Rotating a credential therefore changes its name even when the config is
//! unchanged. `Old` and `Bundle` records use the fixed suffixes `-old` and
//! `-bundle`.

use sha2::{Digest, Sha256};

use crate::core::GenerationClass;

/// Length of the hash suffix in hex digits.
pub const SHORT_HASH_LENGTH: usize = 8;

const OLD_SUFFIX: &str = "-old";
const BUNDLE_SUFFIX: &str = "-bundle";

/// Inputs of [`derive_name`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NameInputs<'a> {
    /// Config checksum
    pub checksum: &'a str,
    /// Unix seconds of the last rotation initiation, or empty
    pub last_rotation_initiation_time: &'a str,
    /// Checksum of the signing CA payload, for signed certificates
    pub signing_ca_checksum: Option<&'a str>,
    /// Use the bare base name for `Current` (legacy CA naming)
    pub ignore_checksum: bool,
}

/// Derive the external identifier of `base` in generation `class`.
pub fn derive_name(base: &str, class: GenerationClass, inputs: &NameInputs<'_>) -> String {
    match class {
        GenerationClass::Old => format!("{base}{OLD_SUFFIX}"),
        GenerationClass::Bundle => format!("{base}{BUNDLE_SUFFIX}"),
        GenerationClass::Current if inputs.ignore_checksum => base.to_string(),
        GenerationClass::Current => {
            let mut seed = String::with_capacity(64);
            seed.push_str(inputs.checksum);
            seed.push_str(inputs.last_rotation_initiation_time);
            if let Some(ca) = inputs.signing_ca_checksum {
                seed.push_str(ca);
            }
            format!("{base}-{}", short_hash(&seed))
        }
    }
}

/// Generation class encoded in `name`, a derived name of `base`.
///
/// Only the fixed `-old` and `-bundle` suffixes are recognized; anything else
/// is a `Current` name.
pub fn class_of(name: &str, base: &str) -> GenerationClass {
    match name.strip_prefix(base) {
        Some(OLD_SUFFIX) => GenerationClass::Old,
        Some(BUNDLE_SUFFIX) => GenerationClass::Bundle,
        _ => GenerationClass::Current,
    }
}

/// First [`SHORT_HASH_LENGTH`] hex digits of SHA-256 over `input`.
pub fn short_hash(input: &str) -> String {
    let mut hex = hex::encode(Sha256::digest(input.as_bytes()));
    hex.truncate(SHORT_HASH_LENGTH);
    hex
}

/// Checksum of a record payload, used for `checksum-of-signing-ca`.
pub fn payload_checksum(data: &crate::core::RecordData) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in data {
        hasher.update((key.len() as u64).to_be_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value);
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix).to_string()
}
