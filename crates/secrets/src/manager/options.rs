//! Per-call options for `generate`

use crate::rotation::RotationStrategy;

/// Options bound to a single [`generate`](super::SecretsManager::generate) call.
///
/// ```
/// use keyward_secrets::{GenerateOptions, RotationStrategy};
///
/// let options = GenerateOptions::new()
///     .persist()
///     .rotate(RotationStrategy::KeepOld);
/// assert!(options.persist);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Exempt the record from cleanup
    pub persist: bool,
    /// Fate of the superseded generation
    pub rotation: RotationStrategy,
    /// Drop the `Old` generation from retrieval and bundles. Cleanup then
    /// retires it unless it carries the persist mark.
    pub ignore_old_secrets: bool,
    /// Name a CA by its base name alone, for identities created before
    /// checksum-based naming
    pub ignore_config_checksum_for_ca_name: bool,
}

impl GenerateOptions {
    /// Defaults: not persisted, in-place rotation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the record persistent.
    pub fn persist(mut self) -> Self {
        self.persist = true;
        self
    }

    /// Set the rotation strategy.
    pub fn rotate(mut self, strategy: RotationStrategy) -> Self {
        self.rotation = strategy;
        self
    }

    /// Stop reporting the retained `Old` generation.
    pub fn ignore_old_secrets(mut self) -> Self {
        self.ignore_old_secrets = true;
        self
    }

    /// Request legacy checksum-free naming for CAs.
    pub fn ignore_config_checksum_for_ca_name(mut self) -> Self {
        self.ignore_config_checksum_for_ca_name = true;
        self
    }
}
