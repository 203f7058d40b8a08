//! Certificate authorities and leaf certificates

use std::net::IpAddr;
use std::time::Duration;

use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{
    DATA_KEY_CERTIFICATE, DATA_KEY_CERTIFICATE_CA, DATA_KEY_PRIVATE_KEY, DATA_KEY_PRIVATE_KEY_CA,
    utf8_entry,
};
use crate::core::{CredentialRecord, RecordData, SecretsError, SecretsResult};

const DEFAULT_CA_VALIDITY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
const DEFAULT_CERT_VALIDITY: Duration = Duration::from_secs(365 * 24 * 60 * 60);
const MAX_VALIDITY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Extended key usage profile of a leaf certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertType {
    /// TLS client authentication
    Client,
    /// TLS server authentication
    Server,
    /// Both
    ServerClient,
}

impl CertType {
    fn extended_key_usages(self) -> Vec<ExtendedKeyUsagePurpose> {
        match self {
            Self::Client => vec![ExtendedKeyUsagePurpose::ClientAuth],
            Self::Server => vec![ExtendedKeyUsagePurpose::ServerAuth],
            Self::ServerClient => vec![
                ExtendedKeyUsagePurpose::ServerAuth,
                ExtendedKeyUsagePurpose::ClientAuth,
            ],
        }
    }
}

/// Self-signed certificate authority.
///
/// The materialized certificate uses the derived record name as its common
/// name so that consecutive generations never share a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaCertificateConfig {
    /// Base name
    pub name: String,
    /// Requested common name; recorded for change detection
    pub common_name: String,
    /// Subject organizations
    #[serde(default)]
    pub organizations: Vec<String>,
    /// Validity period, ten years when unset
    #[serde(default, with = "humantime_serde")]
    pub validity: Option<Duration>,
}

impl CaCertificateConfig {
    /// CA config with default validity and no organizations.
    pub fn new(name: impl Into<String>, common_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            common_name: common_name.into(),
            organizations: Vec::new(),
            validity: None,
        }
    }

    pub(super) fn validate(&self) -> SecretsResult<()> {
        if self.common_name.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "CA '{}' needs a common name",
                self.name
            )));
        }
        validate_validity(&self.name, self.validity)
    }

    pub(super) fn materialize(&self, record_name: &str) -> SecretsResult<RecordData> {
        let fail = |e: rcgen::Error| SecretsError::materialization(&self.name, e);

        let key = KeyPair::generate().map_err(fail)?;
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(record_name, &self.organizations);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        set_validity(&mut params, self.validity.unwrap_or(DEFAULT_CA_VALIDITY));

        let cert = params.self_signed(&key).map_err(fail)?;

        let mut data = RecordData::new();
        data.insert(DATA_KEY_CERTIFICATE_CA.into(), cert.pem().into_bytes());
        data.insert(DATA_KEY_PRIVATE_KEY_CA.into(), key.serialize_pem().into_bytes());
        Ok(data)
    }
}

/// Leaf certificate signed by a managed CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Base name
    pub name: String,
    /// Subject common name
    pub common_name: String,
    /// Subject organizations
    #[serde(default)]
    pub organizations: Vec<String>,
    /// DNS subject alternative names
    #[serde(default)]
    pub dns_names: Vec<String>,
    /// IP subject alternative names
    #[serde(default)]
    pub ip_addresses: Vec<IpAddr>,
    /// Usage profile
    pub cert_type: CertType,
    /// Base name of the signing CA
    pub signing_ca: String,
    /// Validity period, one year when unset
    #[serde(default, with = "humantime_serde")]
    pub validity: Option<Duration>,
}

impl CertificateConfig {
    /// Leaf config without SANs.
    pub fn new(
        name: impl Into<String>,
        common_name: impl Into<String>,
        cert_type: CertType,
        signing_ca: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            common_name: common_name.into(),
            organizations: Vec::new(),
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            cert_type,
            signing_ca: signing_ca.into(),
            validity: None,
        }
    }

    /// Add DNS SANs.
    pub fn with_dns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add IP SANs.
    pub fn with_ip_addresses(mut self, ips: impl IntoIterator<Item = IpAddr>) -> Self {
        self.ip_addresses.extend(ips);
        self
    }

    pub(super) fn validate(&self) -> SecretsResult<()> {
        if self.common_name.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "certificate '{}' needs a common name",
                self.name
            )));
        }
        if self.signing_ca.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "certificate '{}' needs a signing CA",
                self.name
            )));
        }
        if let Some(bad) = self
            .dns_names
            .iter()
            .find(|n| Ia5String::try_from(n.as_str()).is_err())
        {
            return Err(SecretsError::invalid_config(format!(
                "certificate '{}' has a non-ASCII DNS name '{bad}'",
                self.name
            )));
        }
        validate_validity(&self.name, self.validity)
    }

    pub(super) fn materialize(&self, ca: &CredentialRecord) -> SecretsResult<RecordData> {
        let fail = |e: rcgen::Error| SecretsError::materialization(&self.name, e);

        let ca_cert_pem = utf8_entry(ca, DATA_KEY_CERTIFICATE_CA, &self.name)?;
        let ca_key_pem = utf8_entry(ca, DATA_KEY_PRIVATE_KEY_CA, &self.name)?;
        let ca_key = KeyPair::from_pem(ca_key_pem).map_err(fail)?;
        let issuer = Issuer::from_ca_cert_pem(ca_cert_pem, ca_key).map_err(fail)?;

        let key = KeyPair::generate().map_err(fail)?;
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(&self.common_name, &self.organizations);
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = self.cert_type.extended_key_usages();
        for dns in &self.dns_names {
            let dns = Ia5String::try_from(dns.as_str()).map_err(fail)?;
            params.subject_alt_names.push(SanType::DnsName(dns));
        }
        params
            .subject_alt_names
            .extend(self.ip_addresses.iter().copied().map(SanType::IpAddress));
        set_validity(&mut params, self.validity.unwrap_or(DEFAULT_CERT_VALIDITY));

        let cert = params.signed_by(&key, &issuer).map_err(fail)?;

        let mut data = RecordData::new();
        data.insert(DATA_KEY_CERTIFICATE.into(), cert.pem().into_bytes());
        data.insert(DATA_KEY_PRIVATE_KEY.into(), key.serialize_pem().into_bytes());
        data.insert(DATA_KEY_CERTIFICATE_CA.into(), ca_cert_pem.as_bytes().to_vec());
        Ok(data)
    }
}

fn distinguished_name(common_name: &str, organizations: &[String]) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    for org in organizations {
        dn.push(DnType::OrganizationName, org.as_str());
    }
    dn
}

fn set_validity(params: &mut CertificateParams, validity: Duration) {
    let now = OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + validity;
}

fn validate_validity(name: &str, validity: Option<Duration>) -> SecretsResult<()> {
    match validity {
        Some(v) if v.is_zero() || v > MAX_VALIDITY => Err(SecretsError::invalid_config(format!(
            "'{name}' validity must be between 1s and 100 years"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenerationClass;

    fn ca_record() -> CredentialRecord {
        let data = CaCertificateConfig::new("ca", "kubernetes")
            .materialize("ca-1a2b3c4d")
            .unwrap();
        CredentialRecord::new("ca-1a2b3c4d", GenerationClass::Current, data)
    }

    #[test]
    fn ca_materializes_certificate_and_key() {
        let record = ca_record();
        let cert = std::str::from_utf8(record.get(DATA_KEY_CERTIFICATE_CA).unwrap()).unwrap();
        let key = std::str::from_utf8(record.get(DATA_KEY_PRIVATE_KEY_CA).unwrap()).unwrap();
        assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(key.contains("PRIVATE KEY-----"));
    }

    #[test]
    fn leaf_is_signed_and_carries_ca() {
        let ca = ca_record();
        let config = CertificateConfig::new("kube-apiserver", "kube-apiserver", CertType::Server, "ca")
            .with_dns_names(["kubernetes", "kubernetes.default.svc"])
            .with_ip_addresses(["10.0.0.1".parse().unwrap()]);
        let data = config.materialize(&ca).unwrap();

        assert!(data.contains_key(DATA_KEY_CERTIFICATE));
        assert!(data.contains_key(DATA_KEY_PRIVATE_KEY));
        assert_eq!(
            data.get(DATA_KEY_CERTIFICATE_CA).map(Vec::as_slice),
            ca.get(DATA_KEY_CERTIFICATE_CA)
        );
    }

    #[test]
    fn leaf_fails_when_ca_payload_is_incomplete() {
        let record = CredentialRecord::new("ca-broken", GenerationClass::Current, RecordData::new());
        let config = CertificateConfig::new("leaf", "leaf", CertType::Client, "ca");
        assert!(matches!(
            config.materialize(&record),
            Err(SecretsError::MaterializationFailed { .. })
        ));
    }

    #[test]
    fn validity_bounds() {
        let mut config = CaCertificateConfig::new("ca", "kubernetes");
        config.validity = Some(Duration::ZERO);
        assert!(config.validate().is_err());
        config.validity = Some(Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }
}
