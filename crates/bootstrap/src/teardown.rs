//! Removal of the identity a signing request was submitted with
//!
//! A cluster bootstraps either with a short-lived bootstrap token or with a
//! dedicated service account. Once it holds its own client certificate, that
//! identity is deleted. Every deletion tolerates "not found", so a teardown
//! interrupted halfway can simply be repeated.

use async_trait::async_trait;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::error::{BootstrapResult, ClientError};
use crate::request::SigningRequestClient;

/// Username prefix of bootstrap-token identities
pub const BOOTSTRAP_TOKEN_USER_PREFIX: &str = "system:bootstrap:";
/// Username prefix of service-account identities
pub const SERVICE_ACCOUNT_USER_PREFIX: &str = "system:serviceaccount:";
/// Namespace holding bootstrap token secrets
pub const BOOTSTRAP_TOKEN_NAMESPACE: &str = "kube-system";
/// Name prefix of bootstrap token secrets
pub const BOOTSTRAP_TOKEN_SECRET_PREFIX: &str = "bootstrap-token-";

/// Deletion of bootstrap identities on the API server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BootstrapAuthClient: Send + Sync {
    /// Delete a secret.
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// Delete a service account.
    async fn delete_service_account(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// Delete a cluster role binding.
    async fn delete_cluster_role_binding(&self, name: &str) -> Result<(), ClientError>;
}

/// Identity a signing request was submitted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapIdentity {
    /// `system:bootstrap:<id>`
    Token {
        /// Token id
        id: String,
    },
    /// `system:serviceaccount:<namespace>:<name>`
    ServiceAccount {
        /// Namespace
        namespace: String,
        /// Account name
        name: String,
    },
    /// Any other user; nothing to delete
    Other,
}

impl BootstrapIdentity {
    /// Classify a request's username.
    pub fn parse(username: &str) -> Self {
        if let Some(id) = username.strip_prefix(BOOTSTRAP_TOKEN_USER_PREFIX) {
            if !id.is_empty() {
                return Self::Token { id: id.to_string() };
            }
        }
        if let Some(rest) = username.strip_prefix(SERVICE_ACCOUNT_USER_PREFIX) {
            if let Some((namespace, name)) = rest.split_once(':') {
                if !namespace.is_empty() && !name.is_empty() && !name.contains(':') {
                    return Self::ServiceAccount {
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                    };
                }
            }
        }
        Self::Other
    }
}

/// Name of the binding that lets a service account bootstrap `cluster`.
pub fn cluster_role_binding_name(namespace: &str, cluster: &str) -> String {
    format!("system:cluster-bootstrapper:{namespace}:{cluster}")
}

/// Delete the identity the request `request_name` was submitted with.
///
/// A request that no longer exists has nothing left to tear down.
pub async fn delete_bootstrap_auth(
    requests: &dyn SigningRequestClient,
    auth: &dyn BootstrapAuthClient,
    request_name: &str,
    cluster_identity: &str,
) -> BootstrapResult<()> {
    let request = match requests.get(request_name).await {
        Ok(request) => request,
        Err(err) if err.is_not_found() => {
            debug!(request = %request_name, "signing request gone, nothing to tear down");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    match BootstrapIdentity::parse(&request.username) {
        BootstrapIdentity::Token { id } => {
            let secret = format!("{BOOTSTRAP_TOKEN_SECRET_PREFIX}{id}");
            ignore_not_found(auth.delete_secret(BOOTSTRAP_TOKEN_NAMESPACE, &secret).await)?;
            info!(request = %request_name, secret = %secret, "bootstrap token deleted");
        }
        BootstrapIdentity::ServiceAccount { namespace, name } => {
            ignore_not_found(auth.delete_service_account(&namespace, &name).await)?;
            let binding = cluster_role_binding_name(&namespace, cluster_identity);
            ignore_not_found(auth.delete_cluster_role_binding(&binding).await)?;
            info!(
                request = %request_name,
                service_account = %format!("{namespace}/{name}"),
                binding = %binding,
                "bootstrap service account deleted"
            );
        }
        BootstrapIdentity::Other => {
            debug!(request = %request_name, username = %request.username, "no bootstrap identity to delete");
        }
    }
    Ok(())
}

fn ignore_not_found(result: Result<(), ClientError>) -> Result<(), ClientError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;
    use crate::request::{MockSigningRequestClient, SigningRequest, SigningRequestStatus};
    use mockall::Sequence;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const REQUEST: &str = "csr-name";

    fn requests_with_user(username: &'static str) -> MockSigningRequestClient {
        let mut requests = MockSigningRequestClient::new();
        requests.expect_get().with(eq(REQUEST)).returning(move |name| {
            Ok(SigningRequest {
                name: name.to_string(),
                username: username.to_string(),
                status: SigningRequestStatus::Approved { certificate: None },
            })
        });
        requests
    }

    fn not_found(kind: &'static str) -> ClientError {
        ClientError::NotFound {
            kind,
            name: "x".into(),
        }
    }

    #[rstest]
    #[case("system:bootstrap:12345", BootstrapIdentity::Token { id: "12345".into() })]
    #[case(
        "system:serviceaccount:garden:foo",
        BootstrapIdentity::ServiceAccount { namespace: "garden".into(), name: "foo".into() }
    )]
    #[case("system:bootstrap:", BootstrapIdentity::Other)]
    #[case("system:serviceaccount:garden", BootstrapIdentity::Other)]
    #[case("system:serviceaccount:garden:foo:bar", BootstrapIdentity::Other)]
    #[case("alice", BootstrapIdentity::Other)]
    fn parses_usernames(#[case] username: &str, #[case] expected: BootstrapIdentity) {
        assert_eq!(BootstrapIdentity::parse(username), expected);
    }

    #[tokio::test]
    async fn missing_request_is_success() {
        let mut requests = MockSigningRequestClient::new();
        requests
            .expect_get()
            .returning(|_| Err(not_found("CertificateSigningRequest")));
        let auth = MockBootstrapAuthClient::new();

        delete_bootstrap_auth(&requests, &auth, REQUEST, "").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_user_deletes_nothing() {
        let requests = requests_with_user("alice");
        let auth = MockBootstrapAuthClient::new();

        delete_bootstrap_auth(&requests, &auth, REQUEST, "").await.unwrap();
    }

    #[tokio::test]
    async fn deletes_bootstrap_token_secret() {
        let requests = requests_with_user("system:bootstrap:12345");
        let mut auth = MockBootstrapAuthClient::new();
        auth.expect_delete_secret()
            .with(eq("kube-system"), eq("bootstrap-token-12345"))
            .times(1)
            .returning(|_, _| Ok(()));

        delete_bootstrap_auth(&requests, &auth, REQUEST, "").await.unwrap();
    }

    #[tokio::test]
    async fn deletes_service_account_then_binding() {
        let requests = requests_with_user("system:serviceaccount:garden:foo");
        let mut auth = MockBootstrapAuthClient::new();
        let mut seq = Sequence::new();
        auth.expect_delete_service_account()
            .with(eq("garden"), eq("foo"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        auth.expect_delete_cluster_role_binding()
            .with(eq("system:cluster-bootstrapper:garden:shoot-1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        delete_bootstrap_auth(&requests, &auth, REQUEST, "shoot-1").await.unwrap();
    }

    #[tokio::test]
    async fn already_deleted_objects_are_success() {
        let requests = requests_with_user("system:serviceaccount:garden:foo");
        let mut auth = MockBootstrapAuthClient::new();
        auth.expect_delete_service_account()
            .times(1)
            .returning(|_, _| Err(not_found("ServiceAccount")));
        auth.expect_delete_cluster_role_binding()
            .times(1)
            .returning(|_| Err(not_found("ClusterRoleBinding")));

        delete_bootstrap_auth(&requests, &auth, REQUEST, "shoot-1").await.unwrap();
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let requests = requests_with_user("system:bootstrap:12345");
        let mut auth = MockBootstrapAuthClient::new();
        auth.expect_delete_secret()
            .returning(|_, _| Err(ClientError::Transport("reset".into())));

        let result = delete_bootstrap_auth(&requests, &auth, REQUEST, "").await;
        assert!(matches!(
            result,
            Err(BootstrapError::Client(ClientError::Transport(_)))
        ));
    }
}
