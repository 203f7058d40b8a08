//! Request, poll and store the bootstrap client credential

use std::sync::Arc;
use std::time::Duration;

use keyward_secrets::config::{
    ConfigKind, DATA_KEY_KUBECONFIG, KubeconfigAuthInfo, KubeconfigCluster, render_kubeconfig,
};
use keyward_secrets::core::RecordData;
use keyward_secrets::{CredentialRecord, GenerationClass, SecretStore, StoreError};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, BootstrapResult, ClientError};
use crate::request::{SigningRequestClient, SigningRequestStatus, Subject, build_request};
use crate::teardown::{BootstrapAuthClient, delete_bootstrap_auth};

/// Drives one bootstrap exchange against a signer and a credential store.
pub struct BootstrapFlow {
    requests: Arc<dyn SigningRequestClient>,
    auth: Arc<dyn BootstrapAuthClient>,
    store: Arc<dyn SecretStore>,
    config: BootstrapConfig,
}

impl std::fmt::Debug for BootstrapFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapFlow")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Outcome of one poll.
enum Poll {
    Issued(Vec<u8>),
    Waiting { approved: bool },
}

impl BootstrapFlow {
    /// Validate `config` and bind the collaborators.
    pub fn new(
        requests: Arc<dyn SigningRequestClient>,
        auth: Arc<dyn BootstrapAuthClient>,
        store: Arc<dyn SecretStore>,
        config: BootstrapConfig,
    ) -> BootstrapResult<Self> {
        config.validate()?;
        Ok(Self {
            requests,
            auth,
            store,
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Obtain a client credential for `subject` through a signing request.
    ///
    /// Polls until the request is approved and issued, denied or failed,
    /// until `deadline` (the configured default if `None`) elapses, or until
    /// `cancel` fires. On success the kubeconfig is written to the credential
    /// record and the bootstrap identity is torn down. Returns the written
    /// record and the request name.
    ///
    /// The deadline and `cancel` cover submission as well as polling. A
    /// request still pending at the deadline is left in place.
    pub async fn request_bootstrap_credential(
        &self,
        signing_ca: &[u8],
        subject: &Subject,
        cluster_identity: &str,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> BootstrapResult<(CredentialRecord, String)> {
        let deadline = deadline.unwrap_or(self.config.deadline);
        let expires = Instant::now() + deadline;
        let (key, spec) = build_request(subject)?;
        let name = spec.name.clone();

        let submitted = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(request = %name, "submission cancelled");
                return Err(BootstrapError::Cancelled { name });
            }
            () = sleep_until(expires) => {
                warn!(request = %name, ?deadline, "signing request not submitted before deadline");
                return Err(BootstrapError::Timeout { name, deadline });
            }
            submitted = self.requests.create(&spec) => submitted,
        };
        match submitted {
            Ok(_) => info!(request = %name, subject = %subject.common_name, "signing request submitted"),
            Err(ClientError::AlreadyExists { .. }) => {
                debug!(request = %name, "signing request already submitted");
            }
            Err(err) => return Err(err.into()),
        }

        let certificate = match self.await_certificate(&name, expires, deadline, cancel).await {
            Ok(certificate) => certificate,
            Err(err @ (BootstrapError::Denied { .. } | BootstrapError::Failed { .. })) => {
                self.teardown_logged(&name, cluster_identity).await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        info!(request = %name, "signing request approved");

        let kubeconfig = render_kubeconfig(
            &self.config.context_name,
            &KubeconfigCluster {
                server: self.config.server.clone(),
                certificate_authority_data: signing_ca.to_vec(),
            },
            &KubeconfigAuthInfo::client_certificate(certificate, key.serialize_pem().into_bytes()),
        )
        .map_err(|e| BootstrapError::Render(e.to_string()))?;

        let record = self.write_credential(kubeconfig.into_bytes()).await?;
        if let Some(bootstrap) = &self.config.bootstrap_credential_record {
            match self.store.delete(bootstrap).await {
                Ok(()) => info!(record = %bootstrap, "bootstrap credential deleted"),
                Err(StoreError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.teardown_logged(&name, cluster_identity).await;

        Ok((record, name))
    }

    /// Delete the identity the request `request_name` was submitted with.
    pub async fn teardown(&self, request_name: &str, cluster_identity: &str) -> BootstrapResult<()> {
        delete_bootstrap_auth(
            self.requests.as_ref(),
            self.auth.as_ref(),
            request_name,
            cluster_identity,
        )
        .await
    }

    async fn await_certificate(
        &self,
        name: &str,
        expires: Instant,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> BootstrapResult<Vec<u8>> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut approved = false;

        loop {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(request = %name, "polling cancelled");
                    return Err(BootstrapError::Cancelled { name: name.to_string() });
                }
                () = sleep_until(expires) => {
                    warn!(request = %name, ?deadline, approved, "signing request not issued before deadline");
                    return Err(if approved {
                        BootstrapError::MissingCertificate { name: name.to_string() }
                    } else {
                        BootstrapError::Timeout { name: name.to_string(), deadline }
                    });
                }
                polled = async {
                    ticker.tick().await;
                    self.poll(name).await
                } => polled,
            };

            match polled {
                Ok(Poll::Issued(certificate)) => return Ok(certificate),
                Ok(Poll::Waiting { approved: now }) => approved = now,
                Err(BootstrapError::Client(ClientError::Transport(reason))) => {
                    warn!(request = %name, %reason, "polling signing request failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn poll(&self, name: &str) -> BootstrapResult<Poll> {
        let request = self.requests.get(name).await?;
        match request.status {
            SigningRequestStatus::Approved {
                certificate: Some(certificate),
            } if !certificate.is_empty() => Ok(Poll::Issued(certificate)),
            SigningRequestStatus::Approved { .. } => {
                debug!(request = %name, "approved, waiting for certificate");
                Ok(Poll::Waiting { approved: true })
            }
            SigningRequestStatus::Pending => {
                debug!(request = %name, "signing request pending");
                Ok(Poll::Waiting { approved: false })
            }
            SigningRequestStatus::Denied { reason } => Err(BootstrapError::Denied {
                name: name.to_string(),
                reason,
            }),
            SigningRequestStatus::Failed { reason } => Err(BootstrapError::Failed {
                name: name.to_string(),
                reason,
            }),
        }
    }

    // Create, or overwrite the existing record under its current version.
    async fn write_credential(&self, kubeconfig: Vec<u8>) -> BootstrapResult<CredentialRecord> {
        let name = &self.config.credential_record;
        let mut data = RecordData::new();
        data.insert(DATA_KEY_KUBECONFIG.to_string(), kubeconfig);

        let mut record = CredentialRecord::new(name.clone(), GenerationClass::Current, data)
            .with_kind(ConfigKind::Kubeconfig);
        record.immutable = false;

        let written = match self.store.create(record.clone()).await {
            Ok(written) => written,
            Err(StoreError::AlreadyExists { .. }) => {
                let existing = self.store.get(name).await?;
                record.labels = existing.labels;
                self.store.update(record, existing.version).await?
            }
            Err(err) => return Err(err.into()),
        };
        info!(record = %written.name, "bootstrap credential stored");
        Ok(written)
    }

    async fn teardown_logged(&self, request_name: &str, cluster_identity: &str) {
        if let Err(err) = self.teardown(request_name, cluster_identity).await {
            warn!(request = %request_name, error = %err, "bootstrap auth teardown failed");
        }
    }
}
