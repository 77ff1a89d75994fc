//! Authentication adapters.
//!
//! Implementations of the `SessionValidator` port:
//!
//! - `static_tokens` - Fixed token table for tests and local development

mod static_tokens;

pub use static_tokens::StaticSessionValidator;
