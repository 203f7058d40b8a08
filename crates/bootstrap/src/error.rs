//! Error types for the bootstrap flow

use std::time::Duration;

use keyward_secrets::StoreError;
use thiserror::Error;

/// Errors reported by the signing-request and bootstrap-auth clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Object does not exist
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Object kind, e.g. `CertificateSigningRequest`
        kind: &'static str,
        /// Object name
        name: String,
    },

    /// Object with that name already exists
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Object kind
        kind: &'static str,
        /// Object name
        name: String,
    },

    /// Transport-level failure talking to the API server
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Whether the object was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors of the bootstrap credential flow.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The signing request was denied by an approver
    #[error("certificate signing request is denied: '{name}': {reason}")]
    Denied {
        /// Request name
        name: String,
        /// Reason from the denial condition
        reason: String,
    },

    /// The signer could not issue a certificate
    #[error("certificate signing request failed: '{name}': {reason}")]
    Failed {
        /// Request name
        name: String,
        /// Reason from the failure condition
        reason: String,
    },

    /// No terminal condition before the deadline; the request is left in place
    #[error("timed out after {deadline:?} waiting for signing request '{name}'")]
    Timeout {
        /// Request name
        name: String,
        /// Deadline that elapsed
        deadline: Duration,
    },

    /// Approved, but no certificate was issued before the deadline
    #[error("signing request '{name}' was approved but carries no certificate")]
    MissingCertificate {
        /// Request name
        name: String,
    },

    /// The caller cancelled submission or polling
    #[error("signing request '{name}' was cancelled")]
    Cancelled {
        /// Request name
        name: String,
    },

    /// Configuration rejected before any I/O
    #[error("invalid bootstrap config: {reason}")]
    InvalidConfig {
        /// What is wrong
        reason: String,
    },

    /// Signing-request or bootstrap-auth client failure
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Credential store failure
    #[error("credential store: {0}")]
    Store(#[from] StoreError),

    /// Key pair or request generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] rcgen::Error),

    /// Kubeconfig could not be rendered
    #[error("kubeconfig rendering failed: {0}")]
    Render(String),
}

impl BootstrapError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Result type for the bootstrap flow
pub type BootstrapResult<T> = Result<T, BootstrapError>;
