//! Action routing for inbound socket requests.
//!
//! Domain features register a handler per action name at startup. The hub
//! decodes envelopes generically, so the router re-decodes each payload into
//! the handler's own request type before calling it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::foundation::{ConnectionId, PublicUser};

use super::connection::Connection;
use super::messages::{ErrorCode, MessageType};

/// Who sent a request, passed to every handler.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub connection_id: ConnectionId,
    pub user: PublicUser,
    pub request_id: String,
}

/// Sends the reply to one request.
///
/// Both methods consume the responder, so a handler replies at most once.
/// Dropping it without replying is allowed for actions that need no answer.
#[derive(Debug)]
pub struct Responder {
    connection: Arc<Connection>,
    request_id: String,
}

impl Responder {
    pub fn new(connection: Arc<Connection>, request_id: impl Into<String>) -> Self {
        Self {
            connection,
            request_id: request_id.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Reply with an `ack` carrying `payload`.
    pub fn ack<P: Serialize>(self, payload: P) {
        self.connection
            .reply(MessageType::Ack, payload, &self.request_id);
    }

    /// Reply with an `error`.
    pub fn error(self, code: ErrorCode) {
        self.connection.reply_error(code, &self.request_id);
    }
}

/// Handles one inbound action.
#[async_trait]
pub trait ActionHandler: Send + Sync + 'static {
    /// Shape the generic payload is decoded into before `handle` runs.
    type Request: DeserializeOwned + Send;

    async fn handle(&self, ctx: ActionContext, request: Self::Request, responder: Responder);
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn call(
        &self,
        action: &str,
        ctx: ActionContext,
        payload: serde_json::Value,
        responder: Responder,
    );
}

struct Typed<H>(H);

#[async_trait]
impl<H: ActionHandler> ErasedHandler for Typed<H> {
    async fn call(
        &self,
        action: &str,
        ctx: ActionContext,
        payload: serde_json::Value,
        responder: Responder,
    ) {
        match serde_json::from_value::<H::Request>(payload) {
            Ok(request) => self.0.handle(ctx, request, responder).await,
            Err(error) => {
                tracing::debug!(
                    connection_id = %ctx.connection_id,
                    %action,
                    %error,
                    "payload rejected"
                );
                responder.error(ErrorCode::InvalidPayload);
            }
        }
    }
}

/// Registration table from action name to handler.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<String, Arc<dyn ErasedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `action`. A later registration for the same
    /// name replaces the earlier one.
    pub fn register<H: ActionHandler>(&mut self, action: impl Into<String>, handler: H) {
        let action = action.into();
        if self
            .handlers
            .insert(action.clone(), Arc::new(Typed(handler)))
            .is_some()
        {
            tracing::debug!(%action, "replaced action handler");
        }
    }

    pub fn has(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    /// Run the handler registered for `action`.
    ///
    /// Returns `false` without touching `responder` when nothing is
    /// registered, so the caller can report `unknown_action`.
    pub async fn dispatch(
        &self,
        ctx: ActionContext,
        action: &str,
        payload: serde_json::Value,
        responder: Responder,
    ) -> bool {
        let Some(handler) = self.handlers.get(action) else {
            return false;
        };
        handler.call(action, ctx, payload, responder).await;
        true
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("actions", &self.actions())
            .finish()
    }
}
