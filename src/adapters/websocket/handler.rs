//! WebSocket upgrade handler for the problem discussion hub.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Require an authenticated user (401 otherwise, no upgrade)
//! 2. Upgrade to WebSocket with a transport limit above the frame limit
//! 3. Register the connection with the hub
//! 4. Run the writer as its own task and the reader inline
//! 5. Unregister once the reader stops, then wait for the writer

use std::sync::Arc;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Json,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::adapters::http::middleware::RequireAuth;
use crate::domain::foundation::PublicUser;

use super::connection::{Connection, ConnectionSettings, InboundDispatcher};
use super::hub::{Hub, HubStats};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    /// Registry of live connections and rooms.
    pub hub: Arc<Hub>,
    /// Receives every decoded envelope.
    pub dispatcher: Arc<dyn InboundDispatcher>,
    /// Limits and deadlines for new connections.
    pub settings: ConnectionSettings,
    /// Process-wide shutdown; writers close with "going away" when it fires.
    pub shutdown: CancellationToken,
}

impl WebSocketState {
    pub fn new(
        hub: Arc<Hub>,
        dispatcher: Arc<dyn InboundDispatcher>,
        settings: ConnectionSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hub,
            dispatcher,
            settings,
            shutdown,
        }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
///
/// Authentication happens before the upgrade: `RequireAuth` rejects with
/// 401 and the socket is never opened.
pub async fn ws_handler(
    RequireAuth(user): RequireAuth,
    ws: WebSocketUpgrade,
    State(state): State<WebSocketState>,
) -> Response {
    let user = user.public_identity();
    let limit = state.settings.transport_frame_limit();

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, user, state))
}

/// Run an established connection until either side ends it.
async fn handle_socket(socket: WebSocket, user: PublicUser, state: WebSocketState) {
    let (connection, outbound) = Connection::new(user, state.settings.outbound_capacity);
    let span = tracing::info_span!(
        "ws",
        connection_id = %connection.id(),
        user_id = %connection.user().id,
    );

    async move {
        if !state.hub.register(Arc::clone(&connection)).await {
            return;
        }
        tracing::info!("connection opened");

        let (sink, stream) = socket.split();

        let writer = {
            let connection = Arc::clone(&connection);
            let shutdown = state.shutdown.clone();
            let settings = state.settings.clone();
            tokio::spawn(
                async move {
                    connection
                        .start_writing(sink, outbound, shutdown, &settings)
                        .await
                }
                .in_current_span(),
            )
        };

        // The outcome is already logged by the reader.
        let _ = connection
            .start_reading(stream, state.dispatcher.as_ref(), &state.settings)
            .await;

        state.hub.unregister(connection.id()).await;
        if let Err(error) = writer.await {
            tracing::error!(%error, "writer task failed");
        }
        tracing::info!("connection closed");
    }
    .instrument(span)
    .await
}

/// Live connection and room counts.
///
/// Route: `GET /ws/stats`
pub async fn stats_handler(State(state): State<WebSocketState>) -> Json<HubStats> {
    Json(state.hub.stats().await)
}

/// Create axum router for the WebSocket endpoints.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router().with_state(ws_state))
///     .layer(middleware::from_fn_with_state(validator, auth_middleware));
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/stats", get(stats_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::{HubDispatcher, Router};

    fn state() -> WebSocketState {
        let hub = Arc::new(Hub::new());
        let dispatcher = Arc::new(HubDispatcher::new(Arc::clone(&hub), Router::new()));
        WebSocketState::new(
            hub,
            dispatcher,
            ConnectionSettings::default(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn websocket_state_shares_hub() {
        let state = state();
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.hub, &cloned.hub));
    }

    #[test]
    fn upgrade_limit_leaves_room_for_the_size_close() {
        let state = state();
        assert!(state.settings.transport_frame_limit() > state.settings.max_frame_bytes);
    }

    #[tokio::test]
    async fn stats_handler_reports_empty_hub() {
        let Json(stats) = stats_handler(State(state())).await;
        assert_eq!(
            stats,
            HubStats {
                connections: 0,
                rooms: 0
            }
        );
    }
}
