//! Certificate signing requests
//!
//! The flow talks to the remote signer through [`SigningRequestClient`]. A
//! request is named by a digest of its public key, subject and usages, so
//! resubmitting the same key yields the same name.

use async_trait::async_trait;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PublicKeyData};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[cfg(test)]
use mockall::automock;

use crate::error::{BootstrapResult, ClientError};

/// Prefix of every digested request name
pub const REQUEST_NAME_PREFIX: &str = "csr-";

/// Usages requested for a bootstrap client certificate
pub const CLIENT_USAGES: [KeyUsage; 3] = [
    KeyUsage::DigitalSignature,
    KeyUsage::KeyEncipherment,
    KeyUsage::ClientAuth,
];

/// Subject of the requested certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Common name, the identity the certificate authenticates as
    pub common_name: String,
    /// Organizations, the groups the identity belongs to
    #[serde(default)]
    pub organizations: Vec<String>,
}

impl Subject {
    /// Subject with `common_name` in `organizations`.
    pub fn new<I, S>(common_name: impl Into<String>, organizations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            common_name: common_name.into(),
            organizations: organizations.into_iter().map(Into::into).collect(),
        }
    }

    fn distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, self.common_name.as_str());
        for org in &self.organizations {
            dn.push(DnType::OrganizationName, org.as_str());
        }
        dn
    }
}

/// Key usage requested from the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyUsage {
    /// `digital signature`
    DigitalSignature,
    /// `key encipherment`
    KeyEncipherment,
    /// `client auth`
    ClientAuth,
}

impl KeyUsage {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DigitalSignature => "digital signature",
            Self::KeyEncipherment => "key encipherment",
            Self::ClientAuth => "client auth",
        }
    }
}

/// What is submitted to the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequestSpec {
    /// Digested request name
    pub name: String,
    /// PEM-encoded PKCS#10 request
    pub request_pem: String,
    /// Requested usages
    pub usages: Vec<KeyUsage>,
}

/// Condition of a submitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningRequestStatus {
    /// No terminal condition yet
    Pending,
    /// Approved; the certificate appears once the signer issued it
    Approved {
        /// Issued certificate PEM
        certificate: Option<Vec<u8>>,
    },
    /// Denied by an approver
    Denied {
        /// Reason from the condition
        reason: String,
    },
    /// The signer gave up
    Failed {
        /// Reason from the condition
        reason: String,
    },
}

/// A request as seen on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Request name
    pub name: String,
    /// Identity that submitted the request
    pub username: String,
    /// Current condition
    pub status: SigningRequestStatus,
}

/// Access to signing requests on the API server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SigningRequestClient: Send + Sync {
    /// Submit a request.
    async fn create(&self, spec: &SigningRequestSpec) -> Result<SigningRequest, ClientError>;

    /// Fetch a request by name.
    async fn get(&self, name: &str) -> Result<SigningRequest, ClientError>;
}

/// Request name derived from the public key, subject and usages.
pub fn digested_name(public_key_der: &[u8], subject: &Subject, usages: &[KeyUsage]) -> String {
    let mut hasher = Sha256::new();
    // Length prefixes keep adjacent fields from running into each other.
    let mut put = |bytes: &[u8]| {
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    };
    put(public_key_der);
    put(subject.common_name.as_bytes());
    for org in &subject.organizations {
        put(org.as_bytes());
    }
    for usage in usages {
        put(usage.as_str().as_bytes());
    }
    format!("{REQUEST_NAME_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Fresh key pair and the request to submit for it.
pub(crate) fn build_request(subject: &Subject) -> BootstrapResult<(KeyPair, SigningRequestSpec)> {
    let key = KeyPair::generate()?;
    let mut params = CertificateParams::default();
    params.distinguished_name = subject.distinguished_name();
    let request_pem = params.serialize_request(&key)?.pem()?;

    let usages = CLIENT_USAGES.to_vec();
    let spec = SigningRequestSpec {
        name: digested_name(&key.subject_public_key_info(), subject, &usages),
        request_pem,
        usages,
    };
    Ok((key, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_ne;

    fn subject() -> Subject {
        Subject::new("system:cluster:shoot-1", ["system:clusters"])
    }

    #[test]
    fn digested_name_is_stable() {
        let a = digested_name(b"key", &subject(), &CLIENT_USAGES);
        let b = digested_name(b"key", &subject(), &CLIENT_USAGES);
        assert_eq!(a, b);
        assert!(a.starts_with(REQUEST_NAME_PREFIX));
        assert_eq!(a.len(), REQUEST_NAME_PREFIX.len() + 64);
    }

    #[test]
    fn digested_name_covers_every_input() {
        let base = digested_name(b"key", &subject(), &CLIENT_USAGES);
        assert_ne!(base, digested_name(b"other", &subject(), &CLIENT_USAGES));
        assert_ne!(
            base,
            digested_name(b"key", &Subject::new("system:cluster:shoot-2", ["system:clusters"]), &CLIENT_USAGES)
        );
        assert_ne!(base, digested_name(b"key", &subject(), &CLIENT_USAGES[..2]));
    }

    #[test]
    fn request_is_a_pem_csr() {
        let (_key, spec) = build_request(&subject()).unwrap();
        assert!(spec.request_pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert!(spec.name.starts_with(REQUEST_NAME_PREFIX));
        assert_eq!(spec.usages, CLIENT_USAGES.to_vec());
    }
}
