use serde::{Deserialize, Serialize};

use agora_domain::{AgentMetadata, AgentRole, RoomMode, VoteChoice};

/// Client → server command envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Enter a room. Without `room_id` the default-room policy applies.
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        agent_id: String,
        agent_name: String,
        role: AgentRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<AgentMetadata>,
        timestamp: i64,
    },

    /// Leave the resident room.
    Leave { agent_id: String, timestamp: i64 },

    /// Alias of LEAVE kept for wire compatibility.
    LeaveRoom { agent_id: String, timestamp: i64 },

    /// Chat message to every other member of the resident room.
    Message {
        agent_id: String,
        content: String,
        timestamp: i64,
    },

    CreateRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        topic: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<RoomMode>,
        timestamp: i64,
    },

    ListRooms { timestamp: i64 },

    CreateProposal {
        agent_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        proposal_id: Option<String>,
        title: String,
        #[serde(default)]
        description: String,
        /// Overrides the mode's default threshold; must be in `[0, 1]`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
        timestamp: i64,
    },

    Vote {
        agent_id: String,
        proposal_id: String,
        vote: VoteChoice,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
        timestamp: i64,
    },

    UpdateMetadata {
        agent_id: String,
        metadata: AgentMetadata,
        timestamp: i64,
    },

    /// Tool surface: names of the room tools this agent may invoke.
    ListTools { agent_id: String, timestamp: i64 },

    /// Tool surface: invoke a registered room tool.
    InvokeTool {
        agent_id: String,
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<serde_json::Value>,
        timestamp: i64,
    },
}

impl ClientCommand {
    /// Wire name of the discriminant, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "JOIN",
            Self::Leave { .. } => "LEAVE",
            Self::LeaveRoom { .. } => "LEAVE_ROOM",
            Self::Message { .. } => "MESSAGE",
            Self::CreateRoom { .. } => "CREATE_ROOM",
            Self::ListRooms { .. } => "LIST_ROOMS",
            Self::CreateProposal { .. } => "CREATE_PROPOSAL",
            Self::Vote { .. } => "VOTE",
            Self::UpdateMetadata { .. } => "UPDATE_METADATA",
            Self::ListTools { .. } => "LIST_TOOLS",
            Self::InvokeTool { .. } => "INVOKE_TOOL",
        }
    }
}
