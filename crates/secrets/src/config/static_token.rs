//! Static token files for API server token authentication

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DATA_KEY_STATIC_TOKEN_CSV, random_alphanumeric};
use crate::core::{RecordData, SecretsError, SecretsResult};

const TOKEN_LENGTH: usize = 128;

/// Identity a static token authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticToken {
    /// User name
    pub username: String,
    /// User id
    pub user_id: String,
    /// Group memberships
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Token file with one random token per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticTokenConfig {
    /// Base name
    pub name: String,
    /// Entries by token name
    pub tokens: BTreeMap<String, StaticToken>,
}

impl StaticTokenConfig {
    pub(super) fn validate(&self) -> SecretsResult<()> {
        if self.tokens.is_empty() {
            return Err(SecretsError::invalid_config(format!(
                "static token '{}' has no entries",
                self.name
            )));
        }
        for (token_name, token) in &self.tokens {
            let fields = [&token.username, &token.user_id];
            if fields.iter().any(|f| f.is_empty() || f.contains(',')) {
                return Err(SecretsError::invalid_config(format!(
                    "static token '{}' entry '{token_name}' needs a username and user id without commas",
                    self.name
                )));
            }
            if token.groups.iter().any(|g| g.contains('"')) {
                return Err(SecretsError::invalid_config(format!(
                    "static token '{}' entry '{token_name}' has a quoted group",
                    self.name
                )));
            }
        }
        Ok(())
    }

    // One line per entry in token-name order: token,user,uid[,"group1,group2"]
    pub(super) fn materialize(&self) -> RecordData {
        let mut csv = String::new();
        for token in self.tokens.values() {
            let secret = random_alphanumeric(TOKEN_LENGTH);
            csv.push_str(&secret);
            csv.push(',');
            csv.push_str(&token.username);
            csv.push(',');
            csv.push_str(&token.user_id);
            if !token.groups.is_empty() {
                csv.push_str(",\"");
                csv.push_str(&token.groups.join(","));
                csv.push('"');
            }
            csv.push('\n');
        }

        let mut data = RecordData::new();
        data.insert(DATA_KEY_STATIC_TOKEN_CSV.into(), csv.into_bytes());
        data
    }
}
