//! Keyward Secrets - credential lifecycle engine
//!
//! Generates and rotates the credentials of a managed workload cluster:
//! certificate authorities, leaf certificates, basic-auth pairs, RSA keypairs,
//! kubeconfigs and static token files.
//!
//! # Features
//!
//! - **Declarative configs** - callers describe *what* they need; a stable
//!   checksum of the config decides whether new material is minted
//! - **Deterministic naming** - `Current` records are named
//!   `<base>-<short hash>`, `Old` and `Bundle` records use fixed suffixes
//! - **Rotation strategies** - `InPlace` replaces, `KeepOld` retains the prior
//!   generation next to the new one
//! - **Trust bundles** - CA and public-key bundles spanning both generations
//! - **Garbage collection** - records not requested in a run are removed
//!   unless persisted
//!
//! ```no_run
//! use keyward_secrets::prelude::*;
//!
//! # async fn example() -> SecretsResult<()> {
//! let manager = SecretsManager::builder()
//!     .store(MemorySecretStore::new())
//!     .config(ManagerConfig::new("gardenlet"))
//!     .build()?;
//!
//! manager.start_run();
//! let ca = SecretConfig::CaCert(CaCertificateConfig::new("ca", "kubernetes"));
//! manager.generate(&ca, GenerateOptions::new().rotate(RotationStrategy::KeepOld)).await?;
//! let trust_bundle = manager.bundle("ca")?;
//! manager.cleanup().await?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

/// Trust bundle assembly
mod bundle;
/// Credential configs, checksums and materialization
pub mod config;
/// Core types, errors, and labels
pub mod core;
/// Manager façade
pub mod manager;
/// Deterministic record naming
pub mod naming;
/// Rotation planning and execution
pub mod rotation;
/// Store adapter trait and in-memory store
pub mod store;

// ── Root re-exports ─────────────────────────────────────────────────────────

pub use crate::config::{ConfigKind, SecretConfig};
pub use crate::core::{
    CredentialRecord, GenerationClass, RecordLabels, SecretsError, SecretsResult, StoreError,
    StoreResult,
};
pub use crate::manager::{GenerateOptions, ManagerConfig, SecretsManager, SecretsManagerBuilder};
pub use crate::rotation::{RetryPolicy, RotationStrategy};
pub use crate::store::{MemorySecretStore, SecretStore, Selector};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::config::{
        BasicAuthConfig, BasicAuthFormat, CaCertificateConfig, CertType, CertificateConfig,
        ConfigKind, KubeconfigAuthInfo, KubeconfigCluster, KubeconfigConfig, RsaKeypairConfig,
        SecretConfig, StaticToken, StaticTokenConfig,
    };
    pub use crate::core::{
        CredentialRecord, GenerationClass, RecordLabels, SecretsError, SecretsResult, StoreError,
    };
    pub use crate::manager::{GenerateOptions, ManagerConfig, SecretsManager};
    pub use crate::rotation::{RetryPolicy, RotationStrategy};
    pub use crate::store::{MemorySecretStore, SecretStore, Selector};
}
