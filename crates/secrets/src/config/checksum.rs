//! Structural checksum of config parameters
//!
//! A config hashes as a named struct: the struct name seeds the hash, then each
//! field that is not at its zero or default value is mixed in as a pair of
//! field-name hash and value hash. Strings and integers hash with 64-bit FNV-1
//! over their bytes, integers little-endian and widened to eight bytes.
//!
//! Skipping default fields keeps checksums stable when a new optional field is
//! added, and keeps them identical to those recorded by older deployments.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use super::{
    BasicAuthConfig, BasicAuthFormat, BundleConfig, CaCertificateConfig, CertType,
    CertificateConfig, KubeconfigAuthInfo, KubeconfigCluster, KubeconfigConfig, RsaKeypairConfig,
    StaticToken, StaticTokenConfig,
};
use super::basic_auth::{DEFAULT_PASSWORD_LENGTH, DEFAULT_USERNAME};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET_BASIS, |h, b| h.wrapping_mul(FNV_PRIME) ^ u64::from(*b))
}

fn mix_ordered(a: u64, b: u64) -> u64 {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&a.to_le_bytes());
    buf[8..].copy_from_slice(&b.to_le_bytes());
    fnv1(&buf)
}

fn finish_unordered(a: u64) -> u64 {
    fnv1(&a.to_le_bytes())
}

/// A value that can be folded into a config checksum.
pub(crate) trait Structural {
    /// Hash of the value.
    fn structural_hash(&self) -> u64;

    /// Zero values are left out when they appear as struct fields.
    fn is_zero(&self) -> bool;
}

impl<T: Structural + ?Sized> Structural for &T {
    fn structural_hash(&self) -> u64 {
        (**self).structural_hash()
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl Structural for str {
    fn structural_hash(&self) -> u64 {
        fnv1(self.as_bytes())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Structural for String {
    fn structural_hash(&self) -> u64 {
        self.as_str().structural_hash()
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Structural for u8 {
    fn structural_hash(&self) -> u64 {
        fnv1(&[*self])
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Structural for i64 {
    fn structural_hash(&self) -> u64 {
        fnv1(&self.to_le_bytes())
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Structural for usize {
    fn structural_hash(&self) -> u64 {
        fnv1(&(*self as u64).to_le_bytes())
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Structural for bool {
    fn structural_hash(&self) -> u64 {
        fnv1(&[u8::from(*self)])
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Structural for Duration {
    fn structural_hash(&self) -> u64 {
        i64::try_from(self.as_nanos())
            .unwrap_or(i64::MAX)
            .structural_hash()
    }

    fn is_zero(&self) -> bool {
        Duration::is_zero(self)
    }
}

impl Structural for IpAddr {
    fn structural_hash(&self) -> u64 {
        match self {
            Self::V4(ip) => ip.octets().as_slice().structural_hash(),
            Self::V6(ip) => ip.octets().as_slice().structural_hash(),
        }
    }

    fn is_zero(&self) -> bool {
        false
    }
}

impl<T: Structural> Structural for [T] {
    fn structural_hash(&self) -> u64 {
        self.iter()
            .fold(0, |h, item| mix_ordered(h, item.structural_hash()))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Structural> Structural for Vec<T> {
    fn structural_hash(&self) -> u64 {
        self.as_slice().structural_hash()
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Structural> Structural for Option<T> {
    fn structural_hash(&self) -> u64 {
        self.as_ref().map_or(0, Structural::structural_hash)
    }

    fn is_zero(&self) -> bool {
        self.as_ref().is_none_or(Structural::is_zero)
    }
}

impl<V: Structural> Structural for BTreeMap<String, V> {
    fn structural_hash(&self) -> u64 {
        let h = self.iter().fold(0, |h, (key, value)| {
            h ^ mix_ordered(key.structural_hash(), value.structural_hash())
        });
        finish_unordered(h)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

/// Accumulates the fields of one struct.
pub(crate) struct StructHasher(u64);

impl StructHasher {
    pub(crate) fn new(type_name: &str) -> Self {
        Self(type_name.structural_hash())
    }

    pub(crate) fn field<T: Structural>(mut self, name: &str, value: T) -> Self {
        if !value.is_zero() {
            let pair = mix_ordered(name.structural_hash(), value.structural_hash());
            self.0 = finish_unordered(self.0 ^ pair);
        }
        self
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}

/// Value at `value`, or nothing when it equals `default`.
fn unless_default<'a, T: PartialEq + ?Sized>(value: &'a T, default: &T) -> Option<&'a T> {
    (value != default).then_some(value)
}

fn basic_auth_format(format: BasicAuthFormat) -> &'static str {
    match format {
        BasicAuthFormat::Normal => "normal",
        BasicAuthFormat::Csv => "csv",
    }
}

fn cert_type(cert_type: CertType) -> &'static str {
    match cert_type {
        CertType::Client => "client",
        CertType::Server => "server",
        CertType::ServerClient => "serverclient",
    }
}

pub(super) fn basic_auth(c: &BasicAuthConfig) -> u64 {
    StructHasher::new("BasicAuthSecretConfig")
        .field("Name", &c.name)
        .field("Format", basic_auth_format(c.format))
        .field("Username", unless_default(c.username.as_str(), DEFAULT_USERNAME))
        .field("PasswordLength", unless_default(&c.password_length, &DEFAULT_PASSWORD_LENGTH))
        .finish()
}

pub(super) fn ca_certificate(c: &CaCertificateConfig) -> u64 {
    StructHasher::new("CertificateSecretConfig")
        .field("Name", &c.name)
        .field("CommonName", &c.common_name)
        .field("Organization", &c.organizations)
        .field("CertType", "ca")
        .field("Validity", &c.validity)
        .finish()
}

pub(super) fn certificate(c: &CertificateConfig) -> u64 {
    StructHasher::new("CertificateSecretConfig")
        .field("Name", &c.name)
        .field("CommonName", &c.common_name)
        .field("Organization", &c.organizations)
        .field("DNSNames", &c.dns_names)
        .field("IPAddresses", &c.ip_addresses)
        .field("CertType", cert_type(c.cert_type))
        .field("SigningCA", &c.signing_ca)
        .field("Validity", &c.validity)
        .finish()
}

pub(super) fn rsa_keypair(c: &RsaKeypairConfig) -> u64 {
    StructHasher::new("RSASecretConfig")
        .field("Name", &c.name)
        .field("Bits", &c.bits)
        .field("UsedForSSH", &c.used_for_ssh)
        .finish()
}

impl Structural for KubeconfigCluster {
    fn structural_hash(&self) -> u64 {
        StructHasher::new("Cluster")
            .field("Server", &self.server)
            .field("CertificateAuthorityData", &self.certificate_authority_data)
            .finish()
    }

    fn is_zero(&self) -> bool {
        self.server.is_empty() && self.certificate_authority_data.is_empty()
    }
}

impl Structural for KubeconfigAuthInfo {
    fn structural_hash(&self) -> u64 {
        StructHasher::new("AuthInfo")
            .field("Token", &self.token)
            .field("TokenFile", &self.token_file)
            .field("ClientCertificateData", &self.client_certificate_data)
            .field("ClientKeyData", &self.client_key_data)
            .field("Username", &self.username)
            .field("Password", &self.password)
            .finish()
    }

    fn is_zero(&self) -> bool {
        self == &Self::default()
    }
}

pub(super) fn kubeconfig(c: &KubeconfigConfig) -> u64 {
    StructHasher::new("KubeconfigSecretConfig")
        .field("Name", &c.name)
        .field("ContextName", &c.context_name)
        .field("Cluster", &c.cluster)
        .field("AuthInfo", &c.auth_info)
        .finish()
}

impl Structural for StaticToken {
    fn structural_hash(&self) -> u64 {
        StructHasher::new("TokenConfig")
            .field("Username", &self.username)
            .field("UserID", &self.user_id)
            .field("Groups", &self.groups)
            .finish()
    }

    fn is_zero(&self) -> bool {
        false
    }
}

pub(super) fn static_token(c: &StaticTokenConfig) -> u64 {
    StructHasher::new("StaticTokenSecretConfig")
        .field("Name", &c.name)
        .field("Tokens", &c.tokens)
        .finish()
}

pub(super) fn bundle(c: &BundleConfig) -> u64 {
    StructHasher::new("BundleSecretConfig")
        .field("Name", &c.name)
        .field("DataKey", &c.data_key)
        .field("Entries", &c.entries)
        .finish()
}
