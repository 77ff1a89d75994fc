//! Problem discussion chat.
//!
//! Messages posted into a problem's room. Persistence and history belong to
//! the command/query layer; this module only defines what a message is.

mod message;

pub use message::{Attachment, ChatMessage, NewChatMessage, MAX_CONTENT_CHARS};
