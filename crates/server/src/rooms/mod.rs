//! Room engine: membership, fan-out, proposals, topics, federation.

pub mod manager;
pub mod room;
pub mod votes;

pub use manager::RoomManager;
pub use room::{Room, RoomOptions};
pub use votes::{ListenerId, ResolutionEvent, VoteManager};

use agora_protocol::ServerEvent;
use tokio::sync::mpsc;

/// Outbound handle to one client connection.
///
/// Events go through a bounded queue drained by the connection's writer
/// task; `send` never blocks. The kill channel asks the session loop to
/// close the socket, which the server treats as an implicit LEAVE.
#[derive(Clone)]
pub struct ClientSink {
    conn_id: u64,
    events: mpsc::Sender<ServerEvent>,
    kill: mpsc::Sender<()>,
}

impl ClientSink {
    pub fn new(conn_id: u64, events: mpsc::Sender<ServerEvent>, kill: mpsc::Sender<()>) -> Self {
        Self {
            conn_id,
            events,
            kill,
        }
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    /// Bounded, non-blocking enqueue. `false` when the buffer is full or
    /// the connection is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.events.try_send(event).is_ok()
    }

    /// Ask the session loop to close this connection.
    pub fn close(&self) {
        let _ = self.kill.try_send(());
    }
}
