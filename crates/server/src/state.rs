use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agora_domain::config::Config;

use crate::rooms::RoomManager;

/// Shared application state passed to all connection handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Identity of this node on the federation bus.
    pub server_id: String,
    pub rooms: Arc<RoomManager>,
    next_conn_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Arc<Config>, server_id: impl Into<String>, rooms: Arc<RoomManager>) -> Self {
        Self {
            config,
            server_id: server_id.into(),
            rooms,
            next_conn_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mint a process-unique connection id.
    pub fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }
}
