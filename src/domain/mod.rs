//! Domain layer - value objects and rules with no I/O.

pub mod chat;
pub mod foundation;
