//! Review Hub - Real-time problem discussions for the contest review backend
//!
//! Authenticated clients open a WebSocket, focus on one problem at a time and
//! receive that problem's chat messages and review events as they happen.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
