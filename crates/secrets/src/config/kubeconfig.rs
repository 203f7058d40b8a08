//! Kubeconfig rendering

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::DATA_KEY_KUBECONFIG;
use crate::core::{RecordData, SecretsError, SecretsResult};

/// API server a kubeconfig points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigCluster {
    /// Server URL
    pub server: String,
    /// PEM bundle of trusted CAs
    #[serde(default)]
    pub certificate_authority_data: Vec<u8>,
}

/// Credentials a kubeconfig authenticates with. At least one must be set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigAuthInfo {
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a token file
    #[serde(default)]
    pub token_file: Option<String>,
    /// Client certificate PEM
    #[serde(default)]
    pub client_certificate_data: Option<Vec<u8>>,
    /// Client key PEM
    #[serde(default)]
    pub client_key_data: Option<Vec<u8>>,
    /// Basic-auth username
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password
    #[serde(default)]
    pub password: Option<String>,
}

impl KubeconfigAuthInfo {
    /// Client-certificate credentials.
    pub fn client_certificate(certificate: Vec<u8>, key: Vec<u8>) -> Self {
        Self {
            client_certificate_data: Some(certificate),
            client_key_data: Some(key),
            ..Self::default()
        }
    }

    /// Bearer-token credentials.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.token_file.is_none()
            && self.client_certificate_data.is_none()
            && self.username.is_none()
    }
}

impl std::fmt::Debug for KubeconfigAuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeconfigAuthInfo")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_file", &self.token_file)
            .field(
                "client_certificate_data",
                &self.client_certificate_data.as_ref().map(Vec::len),
            )
            .field("client_key_data", &self.client_key_data.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Single-context kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigConfig {
    /// Base name
    pub name: String,
    /// Context, cluster and user name inside the document
    pub context_name: String,
    /// Target cluster
    pub cluster: KubeconfigCluster,
    /// Credentials
    pub auth_info: KubeconfigAuthInfo,
}

impl KubeconfigConfig {
    pub(super) fn validate(&self) -> SecretsResult<()> {
        if self.context_name.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "kubeconfig '{}' needs a context name",
                self.name
            )));
        }
        if self.cluster.server.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "kubeconfig '{}' needs a server",
                self.name
            )));
        }
        if self.auth_info.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "kubeconfig '{}' has no credentials",
                self.name
            )));
        }
        if self.auth_info.client_certificate_data.is_some() != self.auth_info.client_key_data.is_some() {
            return Err(SecretsError::invalid_config(format!(
                "kubeconfig '{}' needs both client certificate and key",
                self.name
            )));
        }
        Ok(())
    }

    pub(super) fn materialize(&self) -> SecretsResult<RecordData> {
        let rendered = render_kubeconfig(&self.context_name, &self.cluster, &self.auth_info)
            .map_err(|e| SecretsError::materialization(&self.name, e))?;

        let mut data = RecordData::new();
        data.insert(DATA_KEY_KUBECONFIG.into(), rendered.into_bytes());
        Ok(data)
    }
}

/// Render a kubeconfig document with one cluster, one user and one context,
/// all named `context_name`.
pub fn render_kubeconfig(
    context_name: &str,
    cluster: &KubeconfigCluster,
    auth: &KubeconfigAuthInfo,
) -> Result<String, serde_yaml::Error> {
    let encode = |bytes: &Vec<u8>| STANDARD.encode(bytes);

    let document = Document {
        api_version: "v1",
        kind: "Config",
        clusters: vec![NamedCluster {
            name: context_name,
            cluster: ClusterEntry {
                server: &cluster.server,
                certificate_authority_data: (!cluster.certificate_authority_data.is_empty())
                    .then(|| STANDARD.encode(&cluster.certificate_authority_data)),
            },
        }],
        contexts: vec![NamedContext {
            name: context_name,
            context: ContextEntry {
                cluster: context_name,
                user: context_name,
            },
        }],
        current_context: context_name,
        users: vec![NamedUser {
            name: context_name,
            user: UserEntry {
                client_certificate_data: auth.client_certificate_data.as_ref().map(encode),
                client_key_data: auth.client_key_data.as_ref().map(encode),
                token: auth.token.as_deref(),
                token_file: auth.token_file.as_deref(),
                username: auth.username.as_deref(),
                password: auth.password.as_deref(),
            },
        }],
        preferences: Preferences {},
    };

    serde_yaml::to_string(&document)
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Document<'a> {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<NamedCluster<'a>>,
    contexts: Vec<NamedContext<'a>>,
    current_context: &'a str,
    users: Vec<NamedUser<'a>>,
    preferences: Preferences,
}

#[derive(Serialize)]
struct Preferences {}

#[derive(Serialize)]
struct NamedCluster<'a> {
    name: &'a str,
    cluster: ClusterEntry<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry<'a> {
    server: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    certificate_authority_data: Option<String>,
}

#[derive(Serialize)]
struct NamedContext<'a> {
    name: &'a str,
    context: ContextEntry<'a>,
}

#[derive(Serialize)]
struct ContextEntry<'a> {
    cluster: &'a str,
    user: &'a str,
}

#[derive(Serialize)]
struct NamedUser<'a> {
    name: &'a str,
    user: UserEntry<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct UserEntry<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    client_certificate_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_key_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(rename = "tokenFile", skip_serializing_if = "Option::is_none")]
    token_file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}
