//! In-Memory Chat Message Repository
//!
//! Keeps posted messages in memory.
//! Useful for testing and development; production wires the backend's
//! relational store behind the same port.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::chat::{ChatMessage, NewChatMessage};
use crate::domain::foundation::{ChatMessageId, DomainError, ProblemId, Timestamp};
use crate::ports::ChatMessageRepository;

/// In-memory storage for chat messages
#[derive(Debug, Clone, Default)]
pub struct InMemoryChatMessageRepository {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
}

impl InMemoryChatMessageRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored messages, oldest first
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    /// Messages posted to one problem, oldest first
    pub async fn messages_for(&self, problem_id: &ProblemId) -> Vec<ChatMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|message| &message.problem_id == problem_id)
            .cloned()
            .collect()
    }

    /// Get the number of stored messages
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl ChatMessageRepository for InMemoryChatMessageRepository {
    async fn save(&self, message: NewChatMessage) -> Result<ChatMessage, DomainError> {
        let saved = message.into_persisted(ChatMessageId::new(), Timestamp::now());
        self.messages.write().await.push(saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PublicUser, UserId};

    fn new_message(problem: &str, content: &str) -> NewChatMessage {
        NewChatMessage::new(
            ProblemId::new(problem).unwrap(),
            PublicUser {
                id: UserId::new("u1").unwrap(),
                username: "alice".to_string(),
                display_name: None,
            },
            content,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn save_assigns_identity_and_keeps_order() {
        let repository = InMemoryChatMessageRepository::new();

        let first = repository.save(new_message("p1", "one")).await.unwrap();
        let second = repository.save(new_message("p1", "two")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(repository.messages().await, vec![first, second]);
    }

    #[tokio::test]
    async fn messages_for_filters_by_problem() {
        let repository = InMemoryChatMessageRepository::new();
        repository.save(new_message("p1", "one")).await.unwrap();
        repository.save(new_message("p2", "two")).await.unwrap();

        let p2 = repository.messages_for(&ProblemId::new("p2").unwrap()).await;

        assert_eq!(p2.len(), 1);
        assert_eq!(p2[0].content, "two");
        assert_eq!(repository.message_count().await, 2);
    }
}
