//! Keyward Bootstrap - initial client credential for a new cluster
//!
//! A freshly created cluster holds only a short-lived bootstrap identity. This
//! crate exchanges it for a real client certificate:
//!
//! 1. generate a key pair and submit a certificate signing request, named by a
//!    digest of its public key, subject and usages;
//! 2. poll the request until it is approved and issued, denied or failed,
//!    bounded by a deadline and cancellable at any point;
//! 3. write a kubeconfig with the issued certificate to the credential store
//!    and tear down the bootstrap identity.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyward_bootstrap::{BootstrapAuthClient, BootstrapConfig, BootstrapFlow, SigningRequestClient, Subject};
//! use keyward_secrets::MemorySecretStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(
//! #     requests: Arc<dyn SigningRequestClient>,
//! #     auth: Arc<dyn BootstrapAuthClient>,
//! #     signing_ca: Vec<u8>,
//! # ) -> keyward_bootstrap::BootstrapResult<()> {
//! let config = BootstrapConfig::new("https://api.example.org", "cluster-kubeconfig")
//!     .with_bootstrap_credential_record("bootstrap-kubeconfig");
//! let flow = BootstrapFlow::new(requests, auth, MemorySecretStore::new(), config)?;
//!
//! let subject = Subject::new("system:cluster:shoot-1", ["system:clusters"]);
//! let (credential, request_name) = flow
//!     .request_bootstrap_credential(&signing_ca, &subject, "shoot-1", None, &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod config;
mod error;
mod flow;
/// Signing requests and their client
pub mod request;
/// Bootstrap identity teardown
pub mod teardown;

pub use config::BootstrapConfig;
pub use error::{BootstrapError, BootstrapResult, ClientError};
pub use flow::BootstrapFlow;
pub use request::{
    KeyUsage, SigningRequest, SigningRequestClient, SigningRequestSpec, SigningRequestStatus,
    Subject, digested_name,
};
pub use teardown::{BootstrapAuthClient, BootstrapIdentity, delete_bootstrap_auth};
