//! Bootstrap flow configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BootstrapError, BootstrapResult};

/// Where the bootstrap flow talks to and writes to.
///
/// ```
/// use keyward_bootstrap::BootstrapConfig;
///
/// let config = BootstrapConfig::new("https://api.example.org", "gardenlet-kubeconfig")
///     .with_bootstrap_credential_record("bootstrap-kubeconfig");
/// config.validate()?;
/// # Ok::<(), keyward_bootstrap::BootstrapError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Interval between polls of the signing request
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Deadline used when the caller passes none
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
    /// API server address written into the kubeconfig
    pub server: String,
    /// Record receiving the issued kubeconfig
    pub credential_record: String,
    /// Record holding the bootstrap kubeconfig, deleted after success
    pub bootstrap_credential_record: Option<String>,
    /// Context, cluster and user name inside the kubeconfig
    pub context_name: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            deadline: Duration::from_secs(30 * 60),
            server: String::new(),
            credential_record: String::new(),
            bootstrap_credential_record: None,
            context_name: "bootstrap".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Config for `server`, writing to `credential_record`.
    pub fn new(server: impl Into<String>, credential_record: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            credential_record: credential_record.into(),
            ..Self::default()
        }
    }

    /// Delete `name` once the issued credential is stored.
    pub fn with_bootstrap_credential_record(mut self, name: impl Into<String>) -> Self {
        self.bootstrap_credential_record = Some(name.into());
        self
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the default deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> BootstrapResult<()> {
        if self.poll_interval.is_zero() {
            return Err(BootstrapError::invalid_config("poll_interval must be positive"));
        }
        if self.deadline < self.poll_interval {
            return Err(BootstrapError::invalid_config(
                "deadline must be at least one poll interval",
            ));
        }
        if self.server.is_empty() {
            return Err(BootstrapError::invalid_config("server must not be empty"));
        }
        if self.credential_record.is_empty() {
            return Err(BootstrapError::invalid_config(
                "credential_record must not be empty",
            ));
        }
        if self.bootstrap_credential_record.as_deref() == Some(self.credential_record.as_str()) {
            return Err(BootstrapError::invalid_config(
                "bootstrap_credential_record must differ from credential_record",
            ));
        }
        if self.context_name.is_empty() {
            return Err(BootstrapError::invalid_config("context_name must not be empty"));
        }
        Ok(())
    }
}
