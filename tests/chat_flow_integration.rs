//! End-to-end flows through the hub without a network: frames go in through
//! a connection's reader and come out of other connections' buffers.

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use review_hub::adapters::storage::InMemoryChatMessageRepository;
use review_hub::adapters::websocket::{
    register_chat_actions, Connection, ConnectionSettings, Frame, Hub, HubBroadcaster,
    HubDispatcher, ReadEnd, Router,
};
use review_hub::application::PostChatMessageHandler;
use review_hub::domain::foundation::{ProblemId, PublicUser, Timestamp, UserId};
use review_hub::ports::MessageBroadcaster;

struct World {
    hub: Arc<Hub>,
    broadcaster: Arc<HubBroadcaster>,
    dispatcher: HubDispatcher,
    repository: InMemoryChatMessageRepository,
}

fn world() -> World {
    let hub = Arc::new(Hub::new());
    let broadcaster = Arc::new(HubBroadcaster::new(Arc::clone(&hub)));
    let repository = InMemoryChatMessageRepository::new();
    let handler = Arc::new(PostChatMessageHandler::new(
        Arc::new(repository.clone()),
        broadcaster.clone(),
    ));
    let mut router = Router::new();
    register_chat_actions(&mut router, handler);
    World {
        dispatcher: HubDispatcher::new(Arc::clone(&hub), router),
        hub,
        broadcaster,
        repository,
    }
}

fn user(id: &str) -> PublicUser {
    PublicUser {
        id: UserId::new(id).unwrap(),
        username: id.to_string(),
        display_name: None,
    }
}

fn problem(id: &str) -> ProblemId {
    ProblemId::new(id).unwrap()
}

async fn connect(hub: &Hub, id: &str) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
    let (connection, rx) = Connection::new(user(id), 16);
    assert!(hub.register(Arc::clone(&connection)).await);
    (connection, rx)
}

fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Value> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|frame| serde_json::from_str(&frame).unwrap())
        .collect()
}

fn frames(values: Vec<Value>) -> impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin {
    stream::iter(
        values
            .into_iter()
            .map(|value| Ok(Message::Text(value.to_string())))
            .collect::<Vec<_>>(),
    )
}

#[tokio::test]
async fn reviewed_event_reaches_exactly_the_focused_members() {
    let w = world();
    let (a, mut rx_a) = connect(&w.hub, "a").await;
    let (b, mut rx_b) = connect(&w.hub, "b").await;
    let (_c, mut rx_c) = connect(&w.hub, "c").await;
    w.hub.set_focus(a.id(), problem("p1")).await;
    w.hub.set_focus(b.id(), problem("p1")).await;

    w.broadcaster
        .broadcast_reviewed(&problem("p1"), &user("rev"), "approved", Timestamp::now())
        .await
        .unwrap();

    let a_frames = drain(&mut rx_a);
    let b_frames = drain(&mut rx_b);
    assert_eq!(a_frames.len(), 1);
    assert_eq!(b_frames.len(), 1);
    assert_eq!(a_frames[0]["type"], "reviewed");
    assert!(drain(&mut rx_c).is_empty());
}

#[tokio::test]
async fn focus_then_post_over_the_read_path() {
    let w = world();
    let (alice, mut alice_rx) = connect(&w.hub, "alice").await;
    let (bob, mut bob_rx) = connect(&w.hub, "bob").await;
    w.hub.set_focus(bob.id(), problem("p1")).await;

    let input = frames(vec![
        json!({"action": "set-active-problem-chat", "payload": {"problem_id": "p1"}, "request_id": "f-1"}),
        json!({"action": "post-problem-chat-message", "payload": {"problem_id": "p1", "content": "hello"}, "request_id": "m-1"}),
        json!({"action": "no-such-action", "request_id": "x-1"}),
    ]);

    let end = alice
        .start_reading(input, &w.dispatcher, &ConnectionSettings::default())
        .await
        .unwrap();
    assert_eq!(end, ReadEnd::StreamEnded);

    let alice_frames = drain(&mut alice_rx);
    let kinds: Vec<&str> = alice_frames
        .iter()
        .map(|frame| frame["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["ack", "user", "ack", "error"]);
    assert_eq!(alice_frames[0]["request_id"], "f-1");
    assert_eq!(alice_frames[2]["request_id"], "m-1");
    assert_eq!(alice_frames[3]["payload"]["code"], "unknown_action");

    let bob_frames = drain(&mut bob_rx);
    assert_eq!(bob_frames.len(), 1);
    assert_eq!(bob_frames[0]["payload"]["content"], "hello");
    assert_eq!(bob_frames[0]["payload"]["sender"]["id"], "alice");
    assert_eq!(w.repository.message_count().await, 1);
}

#[tokio::test]
async fn switching_rooms_moves_the_subscription() {
    let w = world();
    let (conn, mut rx) = connect(&w.hub, "u1").await;

    let input = frames(vec![
        json!({"action": "set-active-problem-chat", "payload": {"problem_id": "p1"}}),
        json!({"action": "set-active-problem-chat", "payload": {"problem_id": "p2"}}),
    ]);
    conn.start_reading(input, &w.dispatcher, &ConnectionSettings::default())
        .await
        .unwrap();
    drain(&mut rx);

    w.broadcaster
        .broadcast_completed(&problem("p1"), &user("x"), Timestamp::now())
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());

    w.broadcaster
        .broadcast_completed(&problem("p2"), &user("x"), Timestamp::now())
        .await
        .unwrap();
    assert_eq!(drain(&mut rx).len(), 1);
    assert_eq!(w.hub.active_rooms().await, vec![problem("p2")]);
}

#[tokio::test]
async fn shutdown_empties_hub_and_unblocks_readers() {
    let w = world();
    let (conn, _rx) = connect(&w.hub, "u1").await;
    w.hub.set_focus(conn.id(), problem("p1")).await;

    let reader = {
        let conn = Arc::clone(&conn);
        let hub = Arc::clone(&w.hub);
        tokio::spawn(async move {
            let dispatcher = HubDispatcher::new(Arc::clone(&hub), Router::new());
            let end = conn
                .start_reading(
                    stream::pending::<Result<Message, axum::Error>>(),
                    &dispatcher,
                    &ConnectionSettings::default(),
                )
                .await;
            hub.unregister(conn.id()).await;
            end
        })
    };

    w.hub.shutdown().await;

    assert_eq!(reader.await.unwrap().unwrap(), ReadEnd::TransportClosed);
    assert!(conn.is_outbound_closed());
    assert_eq!(w.hub.connection_count().await, 0);
    assert_eq!(w.hub.room_count().await, 0);
}
