//! Basic-auth credentials

use serde::{Deserialize, Serialize};

use super::{DATA_KEY_BASIC_AUTH_CSV, DATA_KEY_PASSWORD, DATA_KEY_USERNAME, random_alphanumeric};
use crate::core::{RecordData, SecretsError, SecretsResult};

pub(super) const DEFAULT_USERNAME: &str = "admin";
pub(super) const DEFAULT_PASSWORD_LENGTH: usize = 32;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 256;

/// Output format of a basic-auth credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicAuthFormat {
    /// `username` and `password` entries
    #[default]
    Normal,
    /// Additionally an `auth` entry as `password,username,username`
    Csv,
}

/// Username plus random password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    /// Base name
    pub name: String,
    /// Output format
    #[serde(default)]
    pub format: BasicAuthFormat,
    /// Username, `admin` by default
    #[serde(default = "default_username")]
    pub username: String,
    /// Password length
    #[serde(default = "default_password_length")]
    pub password_length: usize,
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_password_length() -> usize {
    DEFAULT_PASSWORD_LENGTH
}

impl BasicAuthConfig {
    /// Config with the default username and password length.
    pub fn new(name: impl Into<String>, format: BasicAuthFormat) -> Self {
        Self {
            name: name.into(),
            format,
            username: default_username(),
            password_length: DEFAULT_PASSWORD_LENGTH,
        }
    }

    pub(super) fn validate(&self) -> SecretsResult<()> {
        if self.username.is_empty() || self.username.contains(',') {
            return Err(SecretsError::invalid_config(format!(
                "basic auth '{}' needs a username without commas",
                self.name
            )));
        }
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&self.password_length) {
            return Err(SecretsError::invalid_config(format!(
                "basic auth '{}' password length must be within {MIN_PASSWORD_LENGTH}..={MAX_PASSWORD_LENGTH}",
                self.name
            )));
        }
        Ok(())
    }

    pub(super) fn materialize(&self) -> RecordData {
        let password = random_alphanumeric(self.password_length);

        let mut data = RecordData::new();
        data.insert(DATA_KEY_USERNAME.into(), self.username.as_bytes().to_vec());
        data.insert(DATA_KEY_PASSWORD.into(), password.as_bytes().to_vec());
        if self.format == BasicAuthFormat::Csv {
            let line = format!("{},{},{}", password.as_str(), self.username, self.username);
            data.insert(DATA_KEY_BASIC_AUTH_CSV.into(), line.into_bytes());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_format_has_username_and_password() {
        let data = BasicAuthConfig::new("config", BasicAuthFormat::Normal).materialize();
        assert_eq!(data.get(DATA_KEY_USERNAME).map(Vec::as_slice), Some(&b"admin"[..]));
        assert_eq!(data.get(DATA_KEY_PASSWORD).map(Vec::len), Some(DEFAULT_PASSWORD_LENGTH));
        assert!(!data.contains_key(DATA_KEY_BASIC_AUTH_CSV));
    }

    #[test]
    fn csv_format_adds_auth_line() {
        let data = BasicAuthConfig::new("config", BasicAuthFormat::Csv).materialize();
        let password = String::from_utf8(data[DATA_KEY_PASSWORD].clone()).unwrap();
        let auth = String::from_utf8(data[DATA_KEY_BASIC_AUTH_CSV].clone()).unwrap();
        assert_eq!(auth, format!("{password},admin,admin"));
    }

    #[test]
    fn passwords_differ_between_generations() {
        let config = BasicAuthConfig::new("config", BasicAuthFormat::Normal);
        assert_ne!(
            config.materialize()[DATA_KEY_PASSWORD],
            config.materialize()[DATA_KEY_PASSWORD]
        );
    }

    #[test]
    fn short_passwords_are_rejected() {
        let mut config = BasicAuthConfig::new("config", BasicAuthFormat::Normal);
        config.password_length = 4;
        assert!(matches!(
            config.validate(),
            Err(SecretsError::InvalidConfig { .. })
        ));
    }
}
