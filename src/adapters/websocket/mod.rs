//! WebSocket adapters for live problem discussions.
//!
//! Connected clients focus on one problem at a time and receive chat
//! messages and review events for that problem as they happen.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │         Review workflows / PostChatMessageHandler                   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │ MessageBroadcaster
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      HubBroadcaster                                 │
//! │   - Encodes each event once into a shared frame                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │ broadcast_to_room
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           Hub                                       │
//! │   Room: p-17           Room: p-42                                   │
//! │   ├── conn-a           ├── conn-d                                   │
//! │   └── conn-b           └── conn-e                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │ enqueue (never blocks)
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │   Connection: bounded buffer → writer task → socket                 │
//! │               socket → reader → HubDispatcher → Router → actions    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Wire envelopes, message types and error codes
//! - [`connection`] - Per-socket buffer, read loop and write loop
//! - [`router`] - Action name → handler registration table
//! - [`hub`] - Connection registry, rooms, fan-out and shutdown
//! - [`broadcaster`] - `MessageBroadcaster` on top of the hub
//! - [`actions`] - Socket actions backed by application handlers
//! - [`handler`] - Axum upgrade handler

pub mod actions;
pub mod broadcaster;
pub mod connection;
pub mod error;
pub mod handler;
pub mod hub;
pub mod messages;
pub mod router;

pub use actions::{register_chat_actions, PostChatMessageAction, POST_PROBLEM_CHAT_MESSAGE};
pub use broadcaster::HubBroadcaster;
pub use connection::{Connection, ConnectionSettings, InboundDispatcher, ReadEnd};
pub use error::ConnectionError;
pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use hub::{FocusChange, Hub, HubDispatcher, HubStats};
pub use messages::{
    ErrorCode, Frame, InboundEnvelope, MessageType, OutboundEnvelope,
    CLEAR_ACTIVE_PROBLEM_CHAT, SET_ACTIVE_PROBLEM_CHAT,
};
pub use router::{ActionContext, ActionHandler, Responder, Router};
