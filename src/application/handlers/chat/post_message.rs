//! PostChatMessageHandler - Command handler for posting into a problem chat.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::chat::{Attachment, ChatMessage, NewChatMessage};
use crate::domain::foundation::{DomainError, ProblemId, PublicUser, ValidationError};
use crate::ports::{ChatMessageRepository, MessageBroadcaster};

/// Command to post a chat message.
#[derive(Debug, Clone)]
pub struct PostChatMessageCommand {
    pub problem_id: ProblemId,
    pub sender: PublicUser,
    pub content: String,
    pub attachment: Option<Attachment>,
}

/// Errors from posting a chat message.
#[derive(Debug, Error)]
pub enum PostMessageError {
    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to store message: {0}")]
    Repository(DomainError),
}

/// Handler for posting chat messages.
///
/// The message is stored first and only then announced to the room, so
/// nobody sees a message that was never persisted.
pub struct PostChatMessageHandler {
    repository: Arc<dyn ChatMessageRepository>,
    broadcaster: Arc<dyn MessageBroadcaster>,
}

impl PostChatMessageHandler {
    pub fn new(
        repository: Arc<dyn ChatMessageRepository>,
        broadcaster: Arc<dyn MessageBroadcaster>,
    ) -> Self {
        Self {
            repository,
            broadcaster,
        }
    }

    pub async fn handle(&self, cmd: PostChatMessageCommand) -> Result<ChatMessage, PostMessageError> {
        // 1. Validate
        let message = NewChatMessage::new(cmd.problem_id, cmd.sender, &cmd.content, cmd.attachment)?;

        // 2. Persist
        let saved = self
            .repository
            .save(message)
            .await
            .map_err(PostMessageError::Repository)?;

        // 3. Announce. The message is already stored, so a failed broadcast
        //    is logged rather than reported to the sender.
        if let Err(error) = self.broadcaster.broadcast_user_message(&saved).await {
            tracing::error!(
                message_id = %saved.id,
                problem_id = %saved.problem_id,
                %error,
                "failed to broadcast chat message"
            );
        }

        Ok(saved)
    }
}
