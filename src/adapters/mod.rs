//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the hub to the outside world:
//! - `auth` - Session validators
//! - `http` - Axum routes and middleware
//! - `storage` - Chat message repositories
//! - `websocket` - The real-time hub itself

pub mod auth;
pub mod http;
pub mod storage;
pub mod websocket;
