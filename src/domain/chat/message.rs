//! Chat message value types for problem discussions.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ChatMessageId, ProblemId, PublicUser, Timestamp, ValidationError,
};

/// Maximum number of characters in a chat message body.
pub const MAX_CONTENT_CHARS: usize = 4000;

/// Metadata of a file attached to a chat message.
///
/// The file itself lives in object storage; only its description travels
/// through the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub url: String,
}

/// A chat message that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    problem_id: ProblemId,
    sender: PublicUser,
    content: String,
    attachment: Option<Attachment>,
}

impl NewChatMessage {
    /// Validates and builds a new message.
    ///
    /// Content is trimmed. A message must carry text, an attachment, or both.
    pub fn new(
        problem_id: ProblemId,
        sender: PublicUser,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<Self, ValidationError> {
        let content = content.trim().to_string();
        if content.is_empty() && attachment.is_none() {
            return Err(ValidationError::empty_field("content"));
        }
        let chars = content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(ValidationError::too_long("content", MAX_CONTENT_CHARS, chars));
        }
        if let Some(file) = &attachment {
            if file.file_name.trim().is_empty() {
                return Err(ValidationError::empty_field("attachment.file_name"));
            }
        }

        Ok(Self {
            problem_id,
            sender,
            content,
            attachment,
        })
    }

    pub fn problem_id(&self) -> &ProblemId {
        &self.problem_id
    }

    pub fn sender(&self) -> &PublicUser {
        &self.sender
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Assigns identity and send time, as the command layer does on save.
    pub fn into_persisted(self, id: ChatMessageId, sent_at: Timestamp) -> ChatMessage {
        ChatMessage {
            id,
            problem_id: self.problem_id,
            sender: self.sender,
            content: self.content,
            attachment: self.attachment,
            sent_at,
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub problem_id: ProblemId,
    pub sender: PublicUser,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub sent_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn sender() -> PublicUser {
        PublicUser {
            id: UserId::new("u-1").unwrap(),
            username: "alice".to_string(),
            display_name: None,
        }
    }

    fn problem() -> ProblemId {
        ProblemId::new("p1").unwrap()
    }

    fn attachment() -> Attachment {
        Attachment {
            file_name: "trace.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 120,
            url: "https://files.example.com/trace.txt".to_string(),
        }
    }

    #[test]
    fn new_message_trims_content() {
        let msg = NewChatMessage::new(problem(), sender(), "  hello  ", None).unwrap();
        assert_eq!(msg.content(), "hello");
    }

    #[test]
    fn blank_message_without_attachment_is_rejected() {
        let err = NewChatMessage::new(problem(), sender(), "   ", None).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField { .. }));
    }

    #[test]
    fn attachment_only_message_is_accepted() {
        let msg = NewChatMessage::new(problem(), sender(), "", Some(attachment())).unwrap();
        assert_eq!(msg.content(), "");
        assert!(msg.attachment().is_some());
    }

    #[test]
    fn oversized_content_is_rejected() {
        let body = "x".repeat(MAX_CONTENT_CHARS + 1);
        let err = NewChatMessage::new(problem(), sender(), &body, None).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { .. }));
    }

    #[test]
    fn attachment_without_file_name_is_rejected() {
        let mut file = attachment();
        file.file_name = " ".to_string();
        assert!(NewChatMessage::new(problem(), sender(), "see file", Some(file)).is_err());
    }

    #[test]
    fn into_persisted_keeps_fields() {
        let id = ChatMessageId::new();
        let at = Timestamp::now();
        let msg = NewChatMessage::new(problem(), sender(), "hi", None)
            .unwrap()
            .into_persisted(id, at);

        assert_eq!(msg.id, id);
        assert_eq!(msg.sent_at, at);
        assert_eq!(msg.problem_id, problem());
        assert_eq!(msg.sender.username, "alice");
    }
}
