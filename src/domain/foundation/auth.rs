//! Authentication types for the domain layer.
//!
//! These types represent a user whose session has been validated by the
//! external auth oracle. They have **no provider dependencies** - any session
//! backend can populate them via the `SessionValidator` port.
//!
//! # Example
//!
//! ```ignore
//! // In HTTP middleware, after session validation:
//! let user = AuthenticatedUser::new(
//!     UserId::new("user-123")?,
//!     "alice",
//!     Some("Alice".to_string()),
//!     true,
//! );
//!
//! // Inject into request extensions for handlers to use
//! request.extensions_mut().insert(user);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UserId;

/// User whose session was validated by the auth oracle.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the auth provider.
    pub id: UserId,

    /// Login handle, unique across the contest platform.
    pub username: String,

    /// Display name if the user set one.
    pub display_name: Option<String>,

    /// Whether the user completed the email-verification flow.
    pub email_verified: bool,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        display_name: Option<String>,
        email_verified: bool,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            display_name,
            email_verified,
        }
    }

    /// The identity other participants may see.
    pub fn public_identity(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Public identity of a user, safe to broadcast to other participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Authentication errors that can occur during session validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or unknown to the session store.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The session has expired (separate from InvalidToken for specific handling).
    #[error("Token expired")]
    TokenExpired,

    /// Session is valid but the user no longer exists.
    #[error("User not found")]
    UserNotFound,

    /// The session store is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }
}
