use serde::{Deserialize, Serialize};

use agora_domain::{Error, Result};

use crate::event::ServerEvent;

/// Envelope carried on the federation bus.
///
/// `message_id` is globally unique and drives per-room deduplication;
/// `server_id` identifies the publishing node so receivers can drop
/// their own echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEnvelope {
    pub server_id: String,
    pub message_id: String,
    pub timestamp: i64,
    pub payload: ServerEvent,
}

impl BusEnvelope {
    /// Wrap an event with a freshly minted message id.
    pub fn new(server_id: impl Into<String>, timestamp: i64, payload: ServerEvent) -> Self {
        Self {
            server_id: server_id.into(),
            message_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            payload,
        }
    }

    /// Encode as a single JSON line for the relay wire.
    pub fn encode_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Json)
    }

    pub fn decode_line(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Federation(format!("bad bus frame: {e}")))
    }
}
