//! HTTP surface of the hub: authentication on the upgrade route, stats and
//! health.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use review_hub::adapters::auth::StaticSessionValidator;
use review_hub::adapters::http::{build_router, AuthState};
use review_hub::adapters::websocket::{
    Connection, ConnectionSettings, Hub, HubDispatcher, Router, WebSocketState,
};
use review_hub::config::ServerConfig;
use review_hub::domain::foundation::{AuthenticatedUser, ProblemId, UserId};

fn app_with_hub(hub: Arc<Hub>) -> axum::Router {
    let dispatcher = Arc::new(HubDispatcher::new(Arc::clone(&hub), Router::new()));
    let state = WebSocketState::new(
        hub,
        dispatcher,
        ConnectionSettings::default(),
        CancellationToken::new(),
    );
    let validator: AuthState = Arc::new(StaticSessionValidator::new().with_user(
        "good-token",
        AuthenticatedUser::new(UserId::new("u1").unwrap(), "alice", None, true),
    ));
    build_router(state, validator, &ServerConfig::default())
}

fn app() -> axum::Router {
    app_with_hub(Arc::new(Hub::new()))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upgrade_without_session_is_unauthorized() {
    let response = app().oneshot(get("/ws")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn upgrade_with_unknown_token_is_unauthorized() {
    let response = app().oneshot(get("/ws?token=forged")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn authenticated_plain_request_is_not_upgraded() {
    let request = Request::builder()
        .uri("/ws")
        .header(header::AUTHORIZATION, "Bearer good-token")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    // Authentication passed; the request simply isn't a WebSocket handshake.
    assert!(response.status().is_client_error());
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public_and_reports_counts() {
    let response = app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn stats_reflect_hub_state() {
    let hub = Arc::new(Hub::new());
    let (connection, _rx) = Connection::new(
        AuthenticatedUser::new(UserId::new("u2").unwrap(), "bob", None, true).public_identity(),
        8,
    );
    hub.register(Arc::clone(&connection)).await;
    hub.set_focus(connection.id(), ProblemId::new("p1").unwrap())
        .await;

    let response = app_with_hub(hub).oneshot(get("/ws/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["connections"], 1);
    assert_eq!(body["rooms"], 1);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
