//! Secrets manager façade
//!
//! [`SecretsManager`] is what the orchestrator talks to. Each reconciliation
//! pass looks like:
//!
//! 1. [`start_run`](SecretsManager::start_run) to forget the previous pass;
//! 2. one [`generate`](SecretsManager::generate) per desired credential
//!    (different base names may run concurrently);
//! 3. [`cleanup`](SecretsManager::cleanup) to delete every managed record that
//!    was not generated or retained in this pass and is not persisted.
//!
//! The run index is owned by the manager instance; there is no process-wide
//! state.

mod cleanup;
mod config;
mod index;
mod options;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::bundle;
use crate::config::{ConfigKind, SecretConfig};
use crate::core::labels::LABEL_VALUE_SECRETS_MANAGER;
use crate::core::{CredentialRecord, GenerationClass, RecordLabels, SecretsError, SecretsResult};
use crate::naming::{NameInputs, derive_name, payload_checksum};
use crate::rotation::RotationStrategy;
use crate::rotation::engine::{Generation, RotationRequest, converge};
use crate::store::SecretStore;

pub use config::ManagerConfig;
pub use options::GenerateOptions;

use index::{RunEntry, RunIndex};

/// Credential lifecycle manager bound to one store and one identity.
///
/// Cheap to clone; clones share the store and the run index.
#[derive(Clone)]
pub struct SecretsManager {
    store: Arc<dyn SecretStore>,
    config: Arc<ManagerConfig>,
    index: Arc<RwLock<RunIndex>>,
}

impl std::fmt::Debug for SecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsManager")
            .field("identity", &self.config.identity)
            .field("generated", &self.index.read().len())
            .finish_non_exhaustive()
    }
}

impl SecretsManager {
    /// Start building a manager.
    ///
    /// ```
    /// use keyward_secrets::{ManagerConfig, MemorySecretStore, SecretsManager};
    ///
    /// let manager = SecretsManager::builder()
    ///     .store(MemorySecretStore::new())
    ///     .config(ManagerConfig::new("gardenlet"))
    ///     .build()?;
    /// assert_eq!(manager.config().identity, "gardenlet");
    /// # Ok::<(), keyward_secrets::SecretsError>(())
    /// ```
    pub fn builder() -> SecretsManagerBuilder<NoStore> {
        SecretsManagerBuilder::new()
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Forget everything generated so far; the next `cleanup` only spares
    /// what is generated after this call.
    pub fn start_run(&self) {
        self.index.write().clear();
        debug!(identity = %self.config.identity, "new run started");
    }

    /// Converge the store to `config` and return its `Current` record.
    ///
    /// Idempotent: an unchanged config issues zero writes and returns the same
    /// record. A changed config, a changed signing CA, a changed rotation
    /// initiation time or a changed kind yields a new generation.
    pub async fn generate(
        &self,
        config: &SecretConfig,
        options: GenerateOptions,
    ) -> SecretsResult<CredentialRecord> {
        if config.kind() == ConfigKind::Bundle {
            return Err(SecretsError::invalid_config(
                "bundles are assembled by the manager and cannot be generated directly",
            ));
        }
        config.validate()?;

        let base = config.name();
        let signing_ca = self.resolve_signing_ca(config)?;
        let signing_ca_checksum = signing_ca.as_ref().map(|ca| payload_checksum(&ca.data));
        let checksum = config.checksum();
        let rotation_time = self.config.rotation_time_label(base);
        let legacy_name = options.ignore_config_checksum_for_ca_name
            && config.kind() == ConfigKind::CaCert
            && !self.config.legacy_naming_exempt.contains(base);

        let name = derive_name(
            base,
            GenerationClass::Current,
            &NameInputs {
                checksum: &checksum,
                last_rotation_initiation_time: &rotation_time,
                signing_ca_checksum: signing_ca_checksum.as_deref(),
                ignore_checksum: legacy_name,
            },
        );
        let labels = RecordLabels {
            name: base.to_string(),
            managed_by: LABEL_VALUE_SECRETS_MANAGER.to_string(),
            manager_identity: self.config.identity.clone(),
            checksum_of_config: checksum,
            last_rotation_initiation_time: rotation_time,
            rotation_strategy: Some(options.rotation),
            persist: options.persist,
            checksum_of_signing_ca: signing_ca_checksum,
        };

        let request = RotationRequest {
            config,
            name,
            old_name: derive_name(base, GenerationClass::Old, &NameInputs::default()),
            class: GenerationClass::Current,
            labels,
            strategy: options.rotation,
            legacy_name,
            ignore_old: options.ignore_old_secrets,
            signing_ca: signing_ca.as_ref(),
        };
        let Generation { current, old } = converge(self.store.as_ref(), &self.config.retry, &request).await?;

        let bundle = match config.bundle_source() {
            Some(source) => {
                let bundle = bundle::assemble(base, source, &current, old.as_ref())?;
                Some(self.converge_bundle(base, &request.labels, bundle).await?)
            }
            None => None,
        };

        info!(
            name = %base,
            kind = %config.kind(),
            record = %current.name,
            old = ?old.as_ref().map(|r| r.name.as_str()),
            "credential generated"
        );
        self.index.write().record(
            base,
            RunEntry {
                kind: config.kind(),
                current: current.clone(),
                old,
                bundle,
            },
        );
        Ok(current)
    }

    /// Record generated this run for `base`.
    ///
    /// With no class the bundle is returned if the kind has one, the
    /// `Current` record otherwise. A miss is not an error.
    pub fn get(&self, base: &str, class: Option<GenerationClass>) -> Option<CredentialRecord> {
        let index = self.index.read();
        let entry = index.entry(base)?;
        match class {
            Some(class) => entry.class(class).cloned(),
            None => entry.bundle.clone().or_else(|| Some(entry.current.clone())),
        }
    }

    /// Bundle payload of `base`.
    pub fn bundle(&self, base: &str) -> SecretsResult<Vec<u8>> {
        self.get(base, Some(GenerationClass::Bundle))
            .and_then(|record| record.data.into_values().next())
            .ok_or_else(|| SecretsError::NotFound {
                name: base.to_string(),
            })
    }

    fn resolve_signing_ca(&self, config: &SecretConfig) -> SecretsResult<Option<CredentialRecord>> {
        let Some(ca) = config.signing_ca() else {
            return Ok(None);
        };
        self.index
            .read()
            .current_of_kind(ca, ConfigKind::CaCert)
            .cloned()
            .map(Some)
            .ok_or_else(|| SecretsError::DependencyMissing {
                name: config.name().to_string(),
                dependency: ca.to_string(),
            })
    }

    async fn converge_bundle(
        &self,
        base: &str,
        parent: &RecordLabels,
        bundle: crate::config::BundleConfig,
    ) -> SecretsResult<CredentialRecord> {
        let config = SecretConfig::Bundle(bundle);
        let labels = RecordLabels {
            checksum_of_config: config.checksum(),
            rotation_strategy: Some(RotationStrategy::InPlace),
            persist: false,
            checksum_of_signing_ca: None,
            ..parent.clone()
        };
        let request = RotationRequest {
            config: &config,
            name: derive_name(base, GenerationClass::Bundle, &NameInputs::default()),
            old_name: derive_name(base, GenerationClass::Old, &NameInputs::default()),
            class: GenerationClass::Bundle,
            labels,
            strategy: RotationStrategy::InPlace,
            legacy_name: false,
            ignore_old: false,
            signing_ca: None,
        };
        let generation = converge(self.store.as_ref(), &self.config.retry, &request).await?;
        Ok(generation.current)
    }
}

/// Marker: no store configured yet.
#[doc(hidden)]
#[derive(Debug, Default)]
pub struct NoStore;

/// Builder for [`SecretsManager`]; the store is required at compile time.
#[derive(Debug, Default)]
pub struct SecretsManagerBuilder<S> {
    store: S,
    config: ManagerConfig,
}

impl SecretsManagerBuilder<NoStore> {
    /// Builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing store (required).
    pub fn store(self, store: Arc<dyn SecretStore>) -> SecretsManagerBuilder<Arc<dyn SecretStore>> {
        SecretsManagerBuilder {
            store,
            config: self.config,
        }
    }
}

impl<S> SecretsManagerBuilder<S> {
    /// Set the configuration.
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }
}

impl SecretsManagerBuilder<Arc<dyn SecretStore>> {
    /// Validate the configuration and build the manager.
    pub fn build(self) -> SecretsResult<SecretsManager> {
        self.config.validate()?;
        Ok(SecretsManager {
            store: self.store,
            config: Arc::new(self.config),
            index: Arc::new(RwLock::new(RunIndex::default())),
        })
    }
}
