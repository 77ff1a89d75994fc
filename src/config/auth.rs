//! Authentication configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Authentication configuration
///
/// Sessions are owned by the surrounding backend. For local development the
/// hub can accept a fixed table of tokens instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Comma-separated `token=user_id:username` entries
    pub static_tokens: Option<String>,
}

/// One parsed entry of [`AuthConfig::static_tokens`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    pub username: String,
}

impl AuthConfig {
    /// Parse the static token table.
    pub fn static_token_entries(&self) -> Result<Vec<StaticToken>, ValidationError> {
        let Some(raw) = self.static_tokens.as_deref() else {
            return Ok(Vec::new());
        };

        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (token, identity) = entry
                    .split_once('=')
                    .ok_or(ValidationError::InvalidStaticToken)?;
                let (user_id, username) = identity
                    .split_once(':')
                    .ok_or(ValidationError::InvalidStaticToken)?;
                if token.is_empty() || user_id.is_empty() || username.is_empty() {
                    return Err(ValidationError::InvalidStaticToken);
                }
                Ok(StaticToken {
                    token: token.to_string(),
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                })
            })
            .collect()
    }

    /// Validate authentication configuration
    ///
    /// Static tokens are a development convenience and are refused in production.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let entries = self.static_token_entries()?;
        if *environment == Environment::Production && !entries.is_empty() {
            return Err(ValidationError::StaticTokensInProduction);
        }
        Ok(())
    }
}
