//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the review hub.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser, PublicUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ChatMessageId, ConnectionId, ProblemId, UserId};
pub use timestamp::Timestamp;
