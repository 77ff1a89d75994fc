//! The hub: registry of live connections and the problem rooms they focus on.
//!
//! # Architecture
//!
//! ```text
//! Room: p-17           Room: p-42
//! ├── conn-a           ├── conn-d
//! ├── conn-b           └── conn-e
//! └── conn-c
//!                      (conn-f registered, no focus)
//! ```
//!
//! A connection is in at most one room. Rooms exist only while they have
//! members.
//!
//! # Thread Safety
//!
//! One `RwLock` guards both the connection set and the room index, so every
//! reader sees them agree. Register, unregister and focus changes take the
//! write lock; fan-out takes the read lock and only calls the non-blocking
//! [`Connection::enqueue`], so a slow member never holds anyone up.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::close_code;
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{ConnectionId, ProblemId};

use super::connection::{Connection, InboundDispatcher};
use super::messages::{
    ErrorCode, FocusPayload, Frame, InboundEnvelope, MessageType, CLEAR_ACTIVE_PROBLEM_CHAT,
    SET_ACTIVE_PROBLEM_CHAT,
};
use super::router::{ActionContext, Responder, Router};

/// Result of a focus change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusChange {
    /// Already focused on the requested room.
    Unchanged,
    /// Moved into the requested room, out of `previous` if any.
    Moved { previous: Option<ProblemId> },
    /// The connection is not (or no longer) registered.
    NotRegistered,
}

/// Point-in-time counts for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
}

struct Registration {
    connection: Arc<Connection>,
    focus: Option<ProblemId>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, Registration>,
    rooms: HashMap<ProblemId, HashMap<ConnectionId, Arc<Connection>>>,
    closed: bool,
}

impl HubState {
    fn leave_room(&mut self, problem_id: &ProblemId, connection_id: &ConnectionId) {
        if let Some(members) = self.rooms.get_mut(problem_id) {
            members.remove(connection_id);
            if members.is_empty() {
                self.rooms.remove(problem_id);
            }
        }
    }
}

/// Registry of live connections and room membership.
#[derive(Default)]
pub struct Hub {
    state: RwLock<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the live set, with no focus.
    ///
    /// Registering an already-registered connection does nothing. After
    /// shutdown, the connection is refused and its transport closed.
    pub async fn register(&self, connection: Arc<Connection>) -> bool {
        let mut state = self.state.write().await;
        if state.closed {
            drop(state);
            tracing::debug!(connection_id = %connection.id(), "hub closed, refusing connection");
            connection.close_outbound();
            connection.close_transport(close_code::AWAY);
            return false;
        }

        let connection_id = connection.id();
        if state.connections.contains_key(&connection_id) {
            tracing::debug!(%connection_id, "connection already registered");
            return true;
        }

        state.connections.insert(
            connection_id,
            Registration {
                connection,
                focus: None,
            },
        );
        tracing::debug!(%connection_id, connections = state.connections.len(), "connection registered");
        true
    }

    /// Remove a connection, take it out of its room and close its outbound
    /// buffer.
    ///
    /// Unregistering an absent connection is a no-op, since shutdown and a
    /// failing reader can race to do it.
    pub async fn unregister(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        let Some(registration) = state.connections.remove(&connection_id) else {
            tracing::debug!(%connection_id, "connection already unregistered");
            return;
        };
        if let Some(problem_id) = &registration.focus {
            state.leave_room(problem_id, &connection_id);
        }
        drop(state);

        registration.connection.close_outbound();
        tracing::debug!(%connection_id, "connection unregistered");
    }

    /// Move a connection into the room for `problem_id`.
    ///
    /// Whether the user may see this problem is not checked here.
    pub async fn set_focus(&self, connection_id: ConnectionId, problem_id: ProblemId) -> FocusChange {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(registration) = state.connections.get_mut(&connection_id) else {
            return FocusChange::NotRegistered;
        };
        if registration.focus.as_ref() == Some(&problem_id) {
            return FocusChange::Unchanged;
        }

        let previous = registration.focus.replace(problem_id.clone());
        let connection = Arc::clone(&registration.connection);
        if let Some(previous) = &previous {
            state.leave_room(previous, &connection_id);
        }
        state
            .rooms
            .entry(problem_id)
            .or_default()
            .insert(connection_id, connection);

        FocusChange::Moved { previous }
    }

    /// Take a connection out of its room. Returns the room it left.
    pub async fn clear_focus(&self, connection_id: ConnectionId) -> Option<ProblemId> {
        let mut state = self.state.write().await;
        let previous = state
            .connections
            .get_mut(&connection_id)
            .and_then(|registration| registration.focus.take())?;
        state.leave_room(&previous, &connection_id);
        Some(previous)
    }

    /// Enqueue `frame` on every member of the room. Returns how many members
    /// accepted it.
    ///
    /// An empty or unknown room is a no-op.
    pub async fn broadcast_to_room(&self, problem_id: &ProblemId, frame: Frame) -> usize {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(problem_id) else {
            return 0;
        };
        members
            .values()
            .filter(|connection| connection.enqueue(Frame::clone(&frame)))
            .count()
    }

    /// Close every connection and empty the registry.
    ///
    /// Readers notice their transport closing and unregister themselves,
    /// which is then a no-op.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let count = state.connections.len();
        for registration in state.connections.values() {
            registration.connection.close_outbound();
            registration.connection.close_transport(close_code::AWAY);
        }
        state.connections.clear();
        state.rooms.clear();
        state.closed = true;
        tracing::info!(connections = count, "hub shut down");
    }

    /// Wait for `shutdown` and then shut the hub down.
    pub async fn run(&self, shutdown: CancellationToken) {
        shutdown.cancelled().await;
        self.shutdown().await;
    }

    // ============================================
    // Introspection
    // ============================================

    pub async fn stats(&self) -> HubStats {
        let state = self.state.read().await;
        HubStats {
            connections: state.connections.len(),
            rooms: state.rooms.len(),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    /// Members of a room (0 if the room doesn't exist).
    pub async fn room_size(&self, problem_id: &ProblemId) -> usize {
        self.state
            .read()
            .await
            .rooms
            .get(problem_id)
            .map_or(0, HashMap::len)
    }

    /// Rooms that currently have members, sorted.
    pub async fn active_rooms(&self) -> Vec<ProblemId> {
        let mut rooms: Vec<ProblemId> = self.state.read().await.rooms.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    pub async fn focus_of(&self, connection_id: ConnectionId) -> Option<ProblemId> {
        self.state
            .read()
            .await
            .connections
            .get(&connection_id)
            .and_then(|registration| registration.focus.clone())
    }

    pub async fn is_registered(&self, connection_id: ConnectionId) -> bool {
        self.state.read().await.connections.contains_key(&connection_id)
    }

    /// Panics if the connection set and room index disagree.
    #[cfg(test)]
    pub(crate) async fn check_invariants(&self) {
        let state = self.state.read().await;
        for (problem_id, members) in &state.rooms {
            assert!(!members.is_empty(), "room {problem_id} is empty");
            for connection_id in members.keys() {
                let registration = state
                    .connections
                    .get(connection_id)
                    .unwrap_or_else(|| panic!("{connection_id} in {problem_id} is not registered"));
                assert_eq!(registration.focus.as_ref(), Some(problem_id));
            }
        }
        for (connection_id, registration) in &state.connections {
            if let Some(problem_id) = &registration.focus {
                let in_room = state
                    .rooms
                    .get(problem_id)
                    .is_some_and(|members| members.contains_key(connection_id));
                assert!(in_room, "{connection_id} focuses {problem_id} but is not a member");
            }
        }
    }
}

/// Entry point for every decoded envelope.
///
/// Focus actions change hub state and are handled here; everything else goes
/// to the [`Router`].
pub struct HubDispatcher {
    hub: Arc<Hub>,
    router: Router,
}

impl HubDispatcher {
    pub fn new(hub: Arc<Hub>, router: Router) -> Self {
        Self { hub, router }
    }

    async fn set_active_problem_chat(&self, connection: &Arc<Connection>, envelope: InboundEnvelope) {
        let request_id = envelope.request_id;
        let focus: FocusPayload = match serde_json::from_value(envelope.payload) {
            Ok(focus) => focus,
            Err(error) => {
                tracing::debug!(connection_id = %connection.id(), %error, "bad focus payload");
                connection.reply_error(ErrorCode::InvalidPayload, &request_id);
                return;
            }
        };

        match self
            .hub
            .set_focus(connection.id(), focus.problem_id.clone())
            .await
        {
            FocusChange::NotRegistered => {
                tracing::warn!(connection_id = %connection.id(), "focus change for unregistered connection");
                connection.reply_error(ErrorCode::InternalServerError, &request_id);
            }
            change => {
                tracing::debug!(
                    connection_id = %connection.id(),
                    problem_id = %focus.problem_id,
                    ?change,
                    "focus set"
                );
                connection.reply(MessageType::Ack, focus, &request_id);
            }
        }
    }

    async fn clear_active_problem_chat(&self, connection: &Arc<Connection>, request_id: &str) {
        let previous = self.hub.clear_focus(connection.id()).await;
        connection.reply(MessageType::Ack, json!({ "problem_id": previous }), request_id);
    }
}

#[async_trait]
impl InboundDispatcher for HubDispatcher {
    async fn dispatch(&self, connection: &Arc<Connection>, envelope: InboundEnvelope) {
        match envelope.action.as_str() {
            SET_ACTIVE_PROBLEM_CHAT => self.set_active_problem_chat(connection, envelope).await,
            CLEAR_ACTIVE_PROBLEM_CHAT => {
                self.clear_active_problem_chat(connection, &envelope.request_id)
                    .await
            }
            _ => {
                let ctx = ActionContext {
                    connection_id: connection.id(),
                    user: connection.user().clone(),
                    request_id: envelope.request_id.clone(),
                };
                let responder = Responder::new(Arc::clone(connection), envelope.request_id.as_str());
                let handled = self
                    .router
                    .dispatch(ctx, &envelope.action, envelope.payload, responder)
                    .await;
                if !handled {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        action = %envelope.action,
                        "unknown action"
                    );
                    connection.reply_error(ErrorCode::UnknownAction, &envelope.request_id);
                }
            }
        }
    }
}
