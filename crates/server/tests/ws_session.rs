//! Session-layer tests over a real WebSocket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use agora_domain::config::Config;
use agora_protocol::{decode_event, ServerEvent};
use agora_server::rooms::{RoomManager, RoomOptions};
use agora_server::{ws, AppState};
use agora_store::MemoryRepository;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn start_server(config: Config) -> String {
    let config = Arc::new(config);
    let rooms = RoomManager::new(
        Arc::new(MemoryRepository::new()),
        None,
        config.tools.clone(),
        config.rooms.default_mode,
        RoomOptions {
            server_id: "test-node".into(),
            seen_id_limit: 64,
            reap_on_empty: config.rooms.reap_on_empty,
        },
    );
    let state = AppState::new(config, "test-node", rooms);
    let app = ws::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

struct WireClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WireClient {
    async fn connect(url: &str) -> Self {
        let (stream, _) = connect_async(url).await.expect("ws connect");
        Self { stream }
    }

    async fn send(&mut self, frame: serde_json::Value) {
        self.stream
            .send(WsMessage::Text(frame.to_string()))
            .await
            .expect("ws send");
    }

    async fn recv(&mut self) -> ServerEvent {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), self.stream.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("ws error");
            if let WsMessage::Text(text) = frame {
                return decode_event(&text).expect("decodable server event");
            }
        }
    }

    async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

fn join_frame(room_id: Option<&str>, agent_id: &str, name: &str, role: &str) -> serde_json::Value {
    let mut frame = serde_json::json!({
        "type": "JOIN",
        "agentId": agent_id,
        "agentName": name,
        "role": role,
        "timestamp": 1,
    });
    if let Some(room_id) = room_id {
        frame["roomId"] = room_id.into();
    }
    frame
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn create_join_and_chat_over_the_wire() {
    let url = start_server(Config::default()).await;

    let mut alice = WireClient::connect(&url).await;
    alice
        .send(serde_json::json!({
            "type": "CREATE_ROOM",
            "roomId": "r1",
            "topic": "wire test",
            "mode": "quick",
            "timestamp": 1,
        }))
        .await;
    match alice.recv().await {
        ServerEvent::RoomCreated { room_id, .. } => assert_eq!(room_id, "r1"),
        other => panic!("expected ROOM_CREATED, got {}", other.kind()),
    }

    alice
        .send(join_frame(Some("r1"), "alice", "Alice", "architect"))
        .await;
    match alice.recv().await {
        ServerEvent::Welcome { agent_count, .. } => assert_eq!(agent_count, 1),
        other => panic!("expected WELCOME, got {}", other.kind()),
    }

    let mut bob = WireClient::connect(&url).await;
    bob.send(join_frame(Some("r1"), "bob", "Bob", "critic")).await;
    match bob.recv().await {
        ServerEvent::Welcome { agent_count, .. } => assert_eq!(agent_count, 2),
        other => panic!("expected WELCOME, got {}", other.kind()),
    }
    match alice.recv().await {
        ServerEvent::AgentJoined { name, .. } => assert_eq!(name, "Bob"),
        other => panic!("expected AGENT_JOINED, got {}", other.kind()),
    }

    alice
        .send(serde_json::json!({
            "type": "MESSAGE",
            "agentId": "alice",
            "content": "Hello Bob!",
            "timestamp": 2,
        }))
        .await;
    match bob.recv().await {
        ServerEvent::Message {
            agent_id, content, ..
        } => {
            assert_eq!(agent_id, "alice");
            assert_eq!(content, "Hello Bob!");
        }
        other => panic!("expected MESSAGE, got {}", other.kind()),
    }

    // The per-connection queue is FIFO: if Alice had been echoed her own
    // message, it would arrive before this reply.
    alice
        .send(serde_json::json!({"type": "LIST_ROOMS", "timestamp": 3}))
        .await;
    match alice.recv().await {
        ServerEvent::RoomList { rooms, .. } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].agent_count, 2);
        }
        other => panic!("expected ROOM_LIST, got {}", other.kind()),
    }
}

#[tokio::test]
async fn bad_frames_get_errors_and_the_connection_survives() {
    let url = start_server(Config::default()).await;
    let mut client = WireClient::connect(&url).await;

    client.stream.send(WsMessage::Text("not json".into())).await.unwrap();
    assert!(matches!(client.recv().await, ServerEvent::Error { .. }));

    client
        .send(serde_json::json!({"type": "TELEPORT", "timestamp": 1}))
        .await;
    assert!(matches!(client.recv().await, ServerEvent::Error { .. }));

    // Still usable afterwards.
    client
        .send(serde_json::json!({"type": "LIST_ROOMS", "timestamp": 2}))
        .await;
    assert!(matches!(client.recv().await, ServerEvent::RoomList { .. }));
}

#[tokio::test]
async fn commands_outside_a_room_are_rejected() {
    let url = start_server(Config::default()).await;
    let mut client = WireClient::connect(&url).await;

    client
        .send(serde_json::json!({
            "type": "MESSAGE",
            "agentId": "ghost",
            "content": "anyone?",
            "timestamp": 1,
        }))
        .await;
    match client.recv().await {
        ServerEvent::Error { message, .. } => assert_eq!(message, "not a member of any room"),
        other => panic!("expected ERROR, got {}", other.kind()),
    }

    client
        .send(join_frame(Some("nowhere"), "ghost", "Ghost", "participant"))
        .await;
    match client.recv().await {
        ServerEvent::Error { message, .. } => assert_eq!(message, "unknown room"),
        other => panic!("expected ERROR, got {}", other.kind()),
    }
}

#[tokio::test]
async fn default_room_is_created_lazily_when_configured() {
    let mut config = Config::default();
    config.rooms.default_topic = Some("general".into());
    let url = start_server(config).await;

    let mut alice = WireClient::connect(&url).await;
    alice
        .send(join_frame(None, "alice", "Alice", "participant"))
        .await;
    match alice.recv().await {
        ServerEvent::Welcome { room_id, topic, .. } => {
            assert_eq!(room_id, "default");
            assert_eq!(topic, "general");
        }
        other => panic!("expected WELCOME, got {}", other.kind()),
    }

    // A second member lands in the same room.
    let mut bob = WireClient::connect(&url).await;
    bob.send(join_frame(None, "bob", "Bob", "participant")).await;
    match bob.recv().await {
        ServerEvent::Welcome {
            room_id,
            agent_count,
            ..
        } => {
            assert_eq!(room_id, "default");
            assert_eq!(agent_count, 2);
        }
        other => panic!("expected WELCOME, got {}", other.kind()),
    }
}

#[tokio::test]
async fn join_without_room_fails_when_no_default_topic() {
    let url = start_server(Config::default()).await;
    let mut client = WireClient::connect(&url).await;

    client
        .send(join_frame(None, "alice", "Alice", "participant"))
        .await;
    match client.recv().await {
        ServerEvent::Error { message, .. } => assert_eq!(message, "unknown room"),
        other => panic!("expected ERROR, got {}", other.kind()),
    }
}

#[tokio::test]
async fn duplicate_join_over_the_wire_keeps_one_member() {
    let mut config = Config::default();
    config.rooms.default_topic = Some("general".into());
    let url = start_server(config).await;

    let mut alice = WireClient::connect(&url).await;
    alice
        .send(join_frame(None, "alice", "Alice", "architect"))
        .await;
    assert!(matches!(alice.recv().await, ServerEvent::Welcome { .. }));

    let mut impostor = WireClient::connect(&url).await;
    impostor
        .send(join_frame(None, "alice", "Alice II", "critic"))
        .await;
    match impostor.recv().await {
        ServerEvent::Error { message, .. } => assert_eq!(message, "agent already exists"),
        other => panic!("expected ERROR, got {}", other.kind()),
    }

    impostor
        .send(serde_json::json!({"type": "LIST_ROOMS", "timestamp": 2}))
        .await;
    match impostor.recv().await {
        ServerEvent::RoomList { rooms, .. } => assert_eq!(rooms[0].agent_count, 1),
        other => panic!("expected ROOM_LIST, got {}", other.kind()),
    }
}

#[tokio::test]
async fn disconnect_is_an_implicit_leave() {
    let mut config = Config::default();
    config.rooms.default_topic = Some("general".into());
    let url = start_server(config).await;

    let mut alice = WireClient::connect(&url).await;
    alice
        .send(join_frame(None, "alice", "Alice", "architect"))
        .await;
    assert!(matches!(alice.recv().await, ServerEvent::Welcome { .. }));

    let mut bob = WireClient::connect(&url).await;
    bob.send(join_frame(None, "bob", "Bob", "critic")).await;
    assert!(matches!(bob.recv().await, ServerEvent::Welcome { .. }));
    assert!(matches!(alice.recv().await, ServerEvent::AgentJoined { .. }));

    bob.close().await;
    match alice.recv().await {
        ServerEvent::AgentLeft { id, .. } => assert_eq!(id, "bob"),
        other => panic!("expected AGENT_LEFT, got {}", other.kind()),
    }
}

#[tokio::test]
async fn leave_frees_the_connection_for_another_room() {
    let url = start_server(Config::default()).await;
    let mut client = WireClient::connect(&url).await;

    for (room_id, topic) in [("r1", "first"), ("r2", "second")] {
        client
            .send(serde_json::json!({
                "type": "CREATE_ROOM",
                "roomId": room_id,
                "topic": topic,
                "timestamp": 1,
            }))
            .await;
        assert!(matches!(client.recv().await, ServerEvent::RoomCreated { .. }));
    }

    client
        .send(join_frame(Some("r1"), "alice", "Alice", "architect"))
        .await;
    assert!(matches!(client.recv().await, ServerEvent::Welcome { .. }));

    // A second room while resident is refused.
    client
        .send(join_frame(Some("r2"), "alice", "Alice", "architect"))
        .await;
    match client.recv().await {
        ServerEvent::Error { message, .. } => assert_eq!(message, "already joined a room"),
        other => panic!("expected ERROR, got {}", other.kind()),
    }

    client
        .send(serde_json::json!({
            "type": "LEAVE_ROOM",
            "agentId": "alice",
            "timestamp": 2,
        }))
        .await;
    client
        .send(join_frame(Some("r2"), "alice", "Alice", "architect"))
        .await;
    match client.recv().await {
        ServerEvent::Welcome { room_id, .. } => assert_eq!(room_id, "r2"),
        other => panic!("expected WELCOME, got {}", other.kind()),
    }
}
