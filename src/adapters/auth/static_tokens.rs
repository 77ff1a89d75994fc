//! Token-table session validator.
//!
//! Implements the `SessionValidator` port from a fixed map of tokens to
//! users. Used by tests and by local development, where the real session
//! store of the review backend is not running.
//!
//! # Example
//!
//! ```ignore
//! use review_hub::adapters::auth::StaticSessionValidator;
//! use review_hub::domain::foundation::{AuthenticatedUser, UserId};
//!
//! let validator = StaticSessionValidator::new().with_user(
//!     "valid-token",
//!     AuthenticatedUser::new(UserId::new("user-123")?, "alice", None, true),
//! );
//!
//! let result = validator.validate("valid-token").await;
//! assert!(result.is_ok());
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::config::StaticToken;
use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId, ValidationError};
use crate::ports::SessionValidator;

/// Session validator backed by an in-memory token table.
///
/// Tokens not in the table return `InvalidToken`.
#[derive(Debug, Default)]
pub struct StaticSessionValidator {
    /// Map of valid tokens to their associated users
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
    /// Optional error to return for all validations (for error testing)
    force_error: RwLock<Option<AuthError>>,
}

impl StaticSessionValidator {
    /// Creates a new empty validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a validator from configured `token=user_id:username` entries.
    pub fn from_entries(entries: &[StaticToken]) -> Result<Self, ValidationError> {
        let validator = Self::new();
        for entry in entries {
            let user = AuthenticatedUser::new(
                UserId::new(entry.user_id.as_str())?,
                entry.username.as_str(),
                None,
                true,
            );
            validator.add_token(entry.token.as_str(), user);
        }
        Ok(validator)
    }

    /// Adds a valid token that maps to a user.
    pub fn with_user(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.add_token(token, user);
        self
    }

    /// Forces all validations to return the specified error.
    ///
    /// Useful for testing error handling paths.
    pub fn with_error(self, error: AuthError) -> Self {
        *self
            .force_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
        self
    }

    /// Registers a new valid token at runtime.
    pub fn add_token(&self, token: impl Into<String>, user: AuthenticatedUser) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), user);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    /// Returns the number of registered valid tokens.
    pub fn token_count(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl SessionValidator for StaticSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if let Some(error) = self
            .force_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
