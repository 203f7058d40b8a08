//! Declarative credential configs
//!
//! A [`SecretConfig`] describes *what* credential a caller wants. Each variant
//! knows how to
//!
//! - compute a stable checksum of its own parameters ([`SecretConfig::checksum`]),
//!   used for change detection and as input to the derived record name, and
//! - materialize raw key material ([`SecretConfig::materialize`]), possibly from
//!   a dependency such as the signing CA of a leaf certificate.
//!
//! The kind set is closed, so dispatch is an exhaustive `match` rather than a
//! trait object.
//!
//! # Examples
//!
//! ```
//! use keyward_secrets::config::{BasicAuthConfig, BasicAuthFormat, SecretConfig};
//!
//! let config = SecretConfig::BasicAuth(BasicAuthConfig::new("config", BasicAuthFormat::Normal));
//! assert_eq!(config.checksum(), "17492942871593004096");
//! ```

mod basic_auth;
mod bundle;
mod certificate;
mod checksum;
mod kubeconfig;
mod rsa_keypair;
mod static_token;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::core::{CredentialRecord, RecordData, SecretsError, SecretsResult};

pub use basic_auth::{BasicAuthConfig, BasicAuthFormat};
pub use bundle::BundleConfig;
pub use certificate::{CaCertificateConfig, CertType, CertificateConfig};
pub use kubeconfig::{KubeconfigAuthInfo, KubeconfigCluster, KubeconfigConfig, render_kubeconfig};
pub use rsa_keypair::RsaKeypairConfig;
pub use static_token::{StaticToken, StaticTokenConfig};

/// Data key: CA certificate PEM
pub const DATA_KEY_CERTIFICATE_CA: &str = "ca.crt";
/// Data key: CA private key PEM
pub const DATA_KEY_PRIVATE_KEY_CA: &str = "ca.key";
/// Data key: leaf certificate PEM
pub const DATA_KEY_CERTIFICATE: &str = "tls.crt";
/// Data key: leaf private key PEM
pub const DATA_KEY_PRIVATE_KEY: &str = "tls.key";
/// Data key: basic-auth username
pub const DATA_KEY_USERNAME: &str = "username";
/// Data key: basic-auth password
pub const DATA_KEY_PASSWORD: &str = "password";
/// Data key: basic-auth CSV line
pub const DATA_KEY_BASIC_AUTH_CSV: &str = "auth";
/// Data key: RSA private key PEM
pub const DATA_KEY_RSA_PRIVATE_KEY: &str = "id_rsa";
/// Data key: RSA public key (PEM, or OpenSSH line when used for SSH)
pub const DATA_KEY_RSA_PUBLIC_KEY: &str = "id_rsa.pub";
/// Data key: rendered kubeconfig
pub const DATA_KEY_KUBECONFIG: &str = "kubeconfig";
/// Data key: static token CSV file
pub const DATA_KEY_STATIC_TOKEN_CSV: &str = "static_tokens.csv";
/// Data key: concatenated CA certificates
pub const DATA_KEY_CERTIFICATE_BUNDLE: &str = "bundle.crt";
/// Data key: concatenated public keys
pub const DATA_KEY_PUBLIC_KEY_BUNDLE: &str = "bundle.key";

const MAX_NAME_LENGTH: usize = 200;

/// Kind of a credential config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    /// Self-signed certificate authority
    CaCert,
    /// Leaf certificate signed by a CA
    Cert,
    /// Username/password pair
    BasicAuth,
    /// RSA keypair
    RsaKeypair,
    /// Kubeconfig bundle
    Kubeconfig,
    /// Static token file
    StaticToken,
    /// Aggregate built by the bundle assembler
    Bundle,
}

impl ConfigKind {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaCert => "cacert",
            Self::Cert => "cert",
            Self::BasicAuth => "basicauth",
            Self::RsaKeypair => "rsakeypair",
            Self::Kubeconfig => "kubeconfig",
            Self::StaticToken => "statictoken",
            Self::Bundle => "bundle",
        }
    }
}

impl std::fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which payload entry of a generation feeds its bundle, and under which key
/// the bundle stores the concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleSource {
    /// Data key read from `Current` / `Old`
    pub source_key: &'static str,
    /// Data key of the bundle record
    pub bundle_key: &'static str,
}

/// Dependencies handed to [`SecretConfig::materialize`].
#[derive(Debug, Clone, Copy)]
pub struct MaterializeContext<'a> {
    /// Derived name the payload will be stored under
    pub record_name: &'a str,
    /// Current record of the signing CA, for leaf certificates
    pub signing_ca: Option<&'a CredentialRecord>,
}

/// Polymorphic description of one desired credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SecretConfig {
    /// Certificate authority
    CaCert(CaCertificateConfig),
    /// Leaf certificate
    Cert(CertificateConfig),
    /// Basic-auth credential
    BasicAuth(BasicAuthConfig),
    /// RSA keypair
    RsaKeypair(RsaKeypairConfig),
    /// Kubeconfig
    Kubeconfig(KubeconfigConfig),
    /// Static token file
    StaticToken(StaticTokenConfig),
    /// Bundle aggregate
    Bundle(BundleConfig),
}

impl SecretConfig {
    /// Base logical name.
    pub fn name(&self) -> &str {
        match self {
            Self::CaCert(c) => &c.name,
            Self::Cert(c) => &c.name,
            Self::BasicAuth(c) => &c.name,
            Self::RsaKeypair(c) => &c.name,
            Self::Kubeconfig(c) => &c.name,
            Self::StaticToken(c) => &c.name,
            Self::Bundle(c) => &c.name,
        }
    }

    /// Kind of this config.
    pub fn kind(&self) -> ConfigKind {
        match self {
            Self::CaCert(_) => ConfigKind::CaCert,
            Self::Cert(_) => ConfigKind::Cert,
            Self::BasicAuth(_) => ConfigKind::BasicAuth,
            Self::RsaKeypair(_) => ConfigKind::RsaKeypair,
            Self::Kubeconfig(_) => ConfigKind::Kubeconfig,
            Self::StaticToken(_) => ConfigKind::StaticToken,
            Self::Bundle(_) => ConfigKind::Bundle,
        }
    }

    /// Base name of the CA this config must be signed by, if any.
    pub fn signing_ca(&self) -> Option<&str> {
        match self {
            Self::Cert(c) => Some(&c.signing_ca),
            _ => None,
        }
    }

    /// How this kind is bundled across generations, if at all.
    pub fn bundle_source(&self) -> Option<BundleSource> {
        match self {
            Self::CaCert(_) => Some(BundleSource {
                source_key: DATA_KEY_CERTIFICATE_CA,
                bundle_key: DATA_KEY_CERTIFICATE_BUNDLE,
            }),
            Self::RsaKeypair(_) => Some(BundleSource {
                source_key: DATA_KEY_RSA_PUBLIC_KEY,
                bundle_key: DATA_KEY_PUBLIC_KEY_BUNDLE,
            }),
            _ => None,
        }
    }

    /// Stable checksum of name, kind and parameters, as a decimal `u64`.
    ///
    /// Structural FNV-1 hash over the config's fields; fields left at their
    /// default do not contribute.
    pub fn checksum(&self) -> String {
        let hash = match self {
            Self::CaCert(c) => checksum::ca_certificate(c),
            Self::Cert(c) => checksum::certificate(c),
            Self::BasicAuth(c) => checksum::basic_auth(c),
            Self::RsaKeypair(c) => checksum::rsa_keypair(c),
            Self::Kubeconfig(c) => checksum::kubeconfig(c),
            Self::StaticToken(c) => checksum::static_token(c),
            Self::Bundle(c) => checksum::bundle(c),
        };
        hash.to_string()
    }

    /// Reject configs that cannot be materialized.
    pub fn validate(&self) -> SecretsResult<()> {
        validate_name(self.name())?;
        match self {
            Self::CaCert(c) => c.validate(),
            Self::Cert(c) => c.validate(),
            Self::BasicAuth(c) => c.validate(),
            Self::RsaKeypair(c) => c.validate(),
            Self::Kubeconfig(c) => c.validate(),
            Self::StaticToken(c) => c.validate(),
            Self::Bundle(c) => c.validate(),
        }
    }

    /// Generate raw key material.
    ///
    /// Impure: invokes key generation and signing. Must be called at most once
    /// per record.
    pub fn materialize(&self, ctx: &MaterializeContext<'_>) -> SecretsResult<RecordData> {
        match self {
            Self::CaCert(c) => c.materialize(ctx.record_name),
            Self::Cert(c) => {
                let ca = ctx
                    .signing_ca
                    .ok_or_else(|| SecretsError::DependencyMissing {
                        name: c.name.clone(),
                        dependency: c.signing_ca.clone(),
                    })?;
                c.materialize(ca)
            }
            Self::BasicAuth(c) => Ok(c.materialize()),
            Self::RsaKeypair(c) => c.materialize(),
            Self::Kubeconfig(c) => c.materialize(),
            Self::StaticToken(c) => Ok(c.materialize()),
            Self::Bundle(c) => Ok(c.materialize()),
        }
    }
}

fn validate_name(name: &str) -> SecretsResult<()> {
    if name.is_empty() {
        return Err(SecretsError::invalid_config("name cannot be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(SecretsError::invalid_config(format!(
            "name '{name}' exceeds {MAX_NAME_LENGTH} characters"
        )));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if !valid || name.starts_with('-') || name.ends_with('-') {
        return Err(SecretsError::invalid_config(format!(
            "name '{name}' must consist of lowercase alphanumerics, '-' or '.'"
        )));
    }
    Ok(())
}

/// Random alphanumeric string, wiped from memory on drop.
pub(crate) fn random_alphanumeric(len: usize) -> Zeroizing<String> {
    Zeroizing::new(
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect(),
    )
}

pub(crate) fn utf8_entry<'a>(
    record: &'a CredentialRecord,
    key: &str,
    owner: &str,
) -> SecretsResult<&'a str> {
    let bytes = record.get(key).ok_or_else(|| {
        SecretsError::materialization(owner, format!("'{}' has no '{key}' entry", record.name))
    })?;
    std::str::from_utf8(bytes).map_err(|e| SecretsError::materialization(owner, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn basic_auth(name: &str) -> SecretConfig {
        SecretConfig::BasicAuth(BasicAuthConfig::new(name, BasicAuthFormat::Normal))
    }

    #[test]
    fn checksum_is_deterministic() {
        let a = basic_auth("config").checksum();
        let b = basic_auth("config").checksum();
        assert_eq!(a, b);
        assert!(a.parse::<u64>().is_ok(), "checksum must be decimal: {a}");
    }

    #[test]
    fn checksum_covers_name_and_parameters() {
        let base = basic_auth("config").checksum();
        assert_ne!(base, basic_auth("other").checksum());

        let csv = SecretConfig::BasicAuth(BasicAuthConfig::new("config", BasicAuthFormat::Csv));
        assert_ne!(base, csv.checksum());
    }

    #[test]
    fn checksum_covers_kind() {
        let auth = basic_auth("config").checksum();
        let rsa = SecretConfig::RsaKeypair(RsaKeypairConfig::new("config", 2048));
        assert_ne!(auth, rsa.checksum());
    }

    #[rstest]
    #[case("")]
    #[case("Upper")]
    #[case("under_score")]
    #[case("-leading")]
    #[case("trailing-")]
    fn invalid_names_are_rejected(#[case] name: &str) {
        assert!(matches!(
            basic_auth(name).validate(),
            Err(SecretsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn leaf_certificate_requires_signing_ca() {
        let config = SecretConfig::Cert(CertificateConfig::new(
            "kube-apiserver",
            "kube-apiserver",
            CertType::Server,
            "ca-cluster",
        ));
        let err = config
            .materialize(&MaterializeContext {
                record_name: "kube-apiserver-0a1b2c3d",
                signing_ca: None,
            })
            .unwrap_err();
        match err {
            SecretsError::DependencyMissing { name, dependency } => {
                assert_eq!(name, "kube-apiserver");
                assert_eq!(dependency, "ca-cluster");
            }
            other => panic!("expected DependencyMissing, got {other:?}"),
        }
    }

    #[test]
    fn bundle_sources() {
        let ca = SecretConfig::CaCert(CaCertificateConfig::new("ca", "kubernetes"));
        assert_eq!(
            ca.bundle_source().map(|s| s.bundle_key),
            Some(DATA_KEY_CERTIFICATE_BUNDLE)
        );
        assert!(basic_auth("config").bundle_source().is_none());
    }
}
