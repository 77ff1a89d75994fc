//! Chat command handlers.

mod post_message;

pub use post_message::{PostChatMessageCommand, PostChatMessageHandler, PostMessageError};
