//! ChatMessageRepository port - command-side persistence of chat messages.
//!
//! Reading history is served by a separate query path; this port only
//! accepts new messages.

use async_trait::async_trait;

use crate::domain::chat::{ChatMessage, NewChatMessage};
use crate::domain::foundation::DomainError;

/// Persists chat messages posted through the hub.
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// Store a new message, assigning its id and send time.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if persistence fails.
    async fn save(&self, message: NewChatMessage) -> Result<ChatMessage, DomainError>;
}
