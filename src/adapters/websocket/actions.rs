//! Socket actions backed by application handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::application::{PostChatMessageCommand, PostChatMessageHandler, PostMessageError};
use crate::domain::chat::Attachment;
use crate::domain::foundation::ProblemId;

use super::messages::ErrorCode;
use super::router::{ActionContext, ActionHandler, Responder, Router};

/// Inbound action that posts a chat message into a problem room.
pub const POST_PROBLEM_CHAT_MESSAGE: &str = "post-problem-chat-message";

/// Payload of `post-problem-chat-message`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageRequest {
    pub problem_id: ProblemId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// Stores a chat message and fans it out to the room.
pub struct PostChatMessageAction {
    handler: Arc<PostChatMessageHandler>,
}

impl PostChatMessageAction {
    pub fn new(handler: Arc<PostChatMessageHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl ActionHandler for PostChatMessageAction {
    type Request = PostMessageRequest;

    async fn handle(&self, ctx: ActionContext, request: PostMessageRequest, responder: Responder) {
        let cmd = PostChatMessageCommand {
            problem_id: request.problem_id,
            sender: ctx.user,
            content: request.content,
            attachment: request.attachment,
        };

        match self.handler.handle(cmd).await {
            Ok(message) => responder.ack(json!({ "message_id": message.id })),
            Err(PostMessageError::Validation(error)) => {
                tracing::debug!(connection_id = %ctx.connection_id, %error, "chat message rejected");
                responder.error(ErrorCode::InvalidPayload);
            }
            Err(PostMessageError::Repository(error)) => {
                tracing::error!(connection_id = %ctx.connection_id, %error, "failed to store chat message");
                responder.error(ErrorCode::InternalServerError);
            }
        }
    }
}

/// Register the chat actions on `router`.
pub fn register_chat_actions(router: &mut Router, handler: Arc<PostChatMessageHandler>) {
    router.register(POST_PROBLEM_CHAT_MESSAGE, PostChatMessageAction::new(handler));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryChatMessageRepository;
    use crate::adapters::websocket::{Connection, Frame, Hub, HubBroadcaster};
    use crate::domain::foundation::{PublicUser, UserId};
    use serde_json::Value;
    use tokio::sync::mpsc;

    struct Fixture {
        hub: Arc<Hub>,
        repository: InMemoryChatMessageRepository,
        router: Router,
    }

    fn fixture() -> Fixture {
        let hub = Arc::new(Hub::new());
        let repository = InMemoryChatMessageRepository::new();
        let handler = Arc::new(PostChatMessageHandler::new(
            Arc::new(repository.clone()),
            Arc::new(HubBroadcaster::new(Arc::clone(&hub))),
        ));
        let mut router = Router::new();
        register_chat_actions(&mut router, handler);
        Fixture {
            hub,
            repository,
            router,
        }
    }

    async fn member(hub: &Hub, id: &str) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
        let (connection, rx) = Connection::new(
            PublicUser {
                id: UserId::new(id).unwrap(),
                username: id.to_string(),
                display_name: None,
            },
            8,
        );
        hub.register(Arc::clone(&connection)).await;
        hub.set_focus(connection.id(), ProblemId::new("p1").unwrap())
            .await;
        (connection, rx)
    }

    async fn post(router: &Router, connection: &Arc<Connection>, payload: Value) -> bool {
        let ctx = ActionContext {
            connection_id: connection.id(),
            user: connection.user().clone(),
            request_id: "r-1".to_string(),
        };
        router
            .dispatch(
                ctx,
                POST_PROBLEM_CHAT_MESSAGE,
                payload,
                Responder::new(Arc::clone(connection), "r-1"),
            )
            .await
    }

    fn frames(rx: &mut mpsc::Receiver<Frame>) -> Vec<Value> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|frame| serde_json::from_str(&frame).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn post_stores_broadcasts_and_acks() {
        let fx = fixture();
        let (sender, mut sender_rx) = member(&fx.hub, "alice").await;
        let (_other, mut other_rx) = member(&fx.hub, "bob").await;

        assert!(post(&fx.router, &sender, json!({"problem_id": "p1", "content": "hi"})).await);

        let stored = fx.repository.messages().await;
        assert_eq!(stored.len(), 1);

        let sender_frames = frames(&mut sender_rx);
        assert_eq!(sender_frames.len(), 2);
        assert_eq!(sender_frames[0]["type"], "user");
        assert_eq!(sender_frames[1]["type"], "ack");
        assert_eq!(sender_frames[1]["request_id"], "r-1");
        assert_eq!(
            sender_frames[1]["payload"]["message_id"],
            stored[0].id.to_string()
        );

        let other_frames = frames(&mut other_rx);
        assert_eq!(other_frames.len(), 1);
        assert_eq!(other_frames[0]["payload"]["content"], "hi");
        assert_eq!(other_frames[0]["payload"]["sender"]["username"], "alice");
    }

    #[tokio::test]
    async fn empty_message_replies_invalid_payload() {
        let fx = fixture();
        let (sender, mut rx) = member(&fx.hub, "alice").await;

        post(&fx.router, &sender, json!({"problem_id": "p1", "content": "  "})).await;

        let replies = frames(&mut rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["payload"]["code"], "invalid_payload");
        assert_eq!(fx.repository.message_count().await, 0);
    }

    #[tokio::test]
    async fn missing_problem_id_replies_invalid_payload() {
        let fx = fixture();
        let (sender, mut rx) = member(&fx.hub, "alice").await;

        post(&fx.router, &sender, json!({"content": "hi"})).await;

        assert_eq!(frames(&mut rx)[0]["payload"]["code"], "invalid_payload");
    }
}
