//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the hub and the rest of the review backend. Adapters implement these ports.
//!
//! - `SessionValidator` - The authentication oracle guarding the upgrade endpoint
//! - `ChatMessageRepository` - Command-side persistence for posted chat messages
//! - `MessageBroadcaster` - Live event fan-out used by the review workflows

mod chat_message_repository;
mod message_broadcaster;
mod session_validator;

pub use chat_message_repository::ChatMessageRepository;
pub use message_broadcaster::{BroadcastError, MessageBroadcaster};
pub use session_validator::SessionValidator;
