//! WebSocket endpoint for agent connections.
//!
//! Flow:
//! 1. Agent connects to `/ws`.
//! 2. Each text frame is decoded and validated through the codec; bad
//!    frames get `ERROR` back and the connection stays open.
//! 3. `CREATE_ROOM` / `LIST_ROOMS` are answered directly from the room
//!    manager; `JOIN` resolves a room (or the default-room policy) and
//!    makes it this connection's resident room; everything else goes to
//!    the resident room.
//! 4. Disconnect is an implicit LEAVE of the resident room.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use agora_protocol::{decode_command, encode_event, now_ms, ClientCommand, ServerEvent};

use crate::rooms::{ClientSink, Room};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(agent_ws))
        .route("/healthz", get(healthz))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = state.rooms.room_infos().await;
    let agents: usize = rooms.iter().map(|r| r.agent_count).sum();
    axum::Json(serde_json::json!({
        "status": "ok",
        "serverId": state.server_id,
        "rooms": rooms.len(),
        "agents": agents,
    }))
}

/// GET /ws — upgrade to WebSocket.
async fn agent_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Socket handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = state.next_conn_id();
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Bounded outbound queue; overflow closes the connection.
    let buffer = state.config.limits.send_buffer_limit.max(1);
    let (events_tx, mut events_rx) = mpsc::channel::<ServerEvent>(buffer);
    let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);
    let sink = ClientSink::new(conn_id, events_tx, kill_tx);

    // Writer task: encode queued events onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let frame = match encode_event(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if ws_sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    tracing::debug!(conn = conn_id, "connection opened");
    let mut session = Session {
        state,
        sink,
        resident: None,
    };

    loop {
        tokio::select! {
            _ = kill_rx.recv() => {
                tracing::debug!(conn = conn_id, "connection closed by server");
                break;
            }
            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => session.handle_frame(&text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Binary and ws-level ping/pong are not part of the
                        // protocol; axum answers pings itself.
                    }
                    Some(Err(e)) => {
                        tracing::debug!(conn = conn_id, error = %e, "read failed");
                        break;
                    }
                }
            }
        }
    }

    if let Some(room) = session.resident.take() {
        room.handle_disconnect(conn_id).await;
    }
    writer.abort();
    tracing::debug!(conn = conn_id, "connection closed");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-connection dispatch state: a connection resides in at most one
/// room at a time.
struct Session {
    state: AppState,
    sink: ClientSink,
    resident: Option<Arc<Room>>,
}

impl Session {
    async fn handle_frame(&mut self, raw: &str) {
        match decode_command(raw) {
            Ok(cmd) => self.dispatch(cmd).await,
            Err(e) => {
                self.sink.send(ServerEvent::error(e.to_string(), now_ms()));
            }
        }
    }

    async fn dispatch(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::CreateRoom {
                room_id,
                topic,
                mode,
                ..
            } => match self.state.rooms.create(room_id, &topic, mode) {
                Ok(room) => {
                    self.sink.send(ServerEvent::RoomCreated {
                        room_id: room.id().to_string(),
                        topic: room.topic().to_string(),
                        mode: room.mode(),
                        timestamp: now_ms(),
                    });
                }
                Err(e) => {
                    self.sink.send(ServerEvent::error(e.to_string(), now_ms()));
                }
            },

            ClientCommand::ListRooms { .. } => {
                let rooms = self.state.rooms.room_infos().await;
                self.sink.send(ServerEvent::RoomList {
                    rooms,
                    timestamp: now_ms(),
                });
            }

            ClientCommand::Join {
                room_id,
                agent_id,
                agent_name,
                role,
                metadata,
                ..
            } => {
                if let Some(room) = self.resident.clone() {
                    if room_id.as_deref().map_or(true, |id| id == room.id()) {
                        // Re-JOIN of the resident room runs into the
                        // duplicate-agent guard.
                        room.join(self.sink.clone(), agent_id, agent_name, role, metadata)
                            .await;
                    } else {
                        self.sink
                            .send(ServerEvent::error("already joined a room", now_ms()));
                    }
                    return;
                }

                let Some(room) = self.resolve_room(room_id.as_deref()) else {
                    self.sink.send(ServerEvent::error("unknown room", now_ms()));
                    return;
                };
                if room
                    .join(self.sink.clone(), agent_id, agent_name, role, metadata)
                    .await
                {
                    self.resident = Some(room);
                }
            }

            ClientCommand::Leave { agent_id, .. } | ClientCommand::LeaveRoom { agent_id, .. } => {
                match self.resident.clone() {
                    Some(room) => {
                        if room.leave(self.sink.conn_id(), &agent_id).await {
                            self.resident = None;
                        }
                    }
                    None => {
                        self.sink
                            .send(ServerEvent::error("not a member of any room", now_ms()));
                    }
                }
            }

            // Everything else belongs to the resident room.
            cmd => match self.resident.clone() {
                Some(room) => room.handle_command(&self.sink, cmd).await,
                None => {
                    self.sink
                        .send(ServerEvent::error("not a member of any room", now_ms()));
                }
            },
        }
    }

    /// Resolve the JOIN target. Without a room id the `default` room is
    /// used, lazily created when a default topic is configured.
    fn resolve_room(&self, room_id: Option<&str>) -> Option<Arc<Room>> {
        match room_id {
            Some(id) => self.state.rooms.get(id),
            None => {
                if let Some(room) = self.state.rooms.get("default") {
                    return Some(room);
                }
                let topic = self.state.config.rooms.default_topic.clone()?;
                match self.state.rooms.create(Some("default".into()), &topic, None) {
                    Ok(room) => Some(room),
                    // Lost a create race; the winner's room is fine.
                    Err(_) => self.state.rooms.get("default"),
                }
            }
        }
    }
}
