//! HTTP adapters - routes and middleware.

pub mod app;
pub mod middleware;

pub use app::{build_cors_layer, build_router, HealthResponse};
pub use middleware::{auth_middleware, AuthState, RequireAuth};
