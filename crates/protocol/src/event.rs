use serde::{Deserialize, Serialize};

use agora_domain::{AgentMetadata, AgentRole, ProposalStatus, RoomMode, VoteChoice};

/// Server → client event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent to the joiner only.
    Welcome {
        room_id: String,
        topic: String,
        mode: RoomMode,
        agent_count: usize,
        /// Room tools the joiner is permitted to invoke.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tools: Vec<String>,
        timestamp: i64,
    },

    AgentJoined {
        id: String,
        name: String,
        role: AgentRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<AgentMetadata>,
        timestamp: i64,
    },

    AgentLeft {
        id: String,
        name: String,
        timestamp: i64,
    },

    Message {
        room_id: String,
        agent_id: String,
        agent_name: String,
        role: AgentRole,
        content: String,
        timestamp: i64,
    },

    Error { message: String, timestamp: i64 },

    RoomCreated {
        room_id: String,
        topic: String,
        mode: RoomMode,
        timestamp: i64,
    },

    RoomList {
        rooms: Vec<RoomInfo>,
        timestamp: i64,
    },

    ProposalCreated {
        proposal_id: String,
        title: String,
        description: String,
        proposer_id: String,
        proposer_name: String,
        threshold: f64,
        timestamp: i64,
    },

    VoteCast {
        proposal_id: String,
        agent_id: String,
        agent_name: String,
        vote: VoteChoice,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
        timestamp: i64,
    },

    ProposalResolved {
        proposal_id: String,
        status: ProposalStatus,
        yes: usize,
        no: usize,
        abstain: usize,
        total: usize,
        timestamp: i64,
    },

    AgentMetadataUpdated {
        agent_id: String,
        metadata: AgentMetadata,
        timestamp: i64,
    },

    ToolList {
        tools: Vec<ToolInfo>,
        timestamp: i64,
    },

    ToolResult {
        tool: String,
        agent_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: i64,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>, timestamp: i64) -> Self {
        Self::Error {
            message: message.into(),
            timestamp,
        }
    }

    /// Wire name of the discriminant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "WELCOME",
            Self::AgentJoined { .. } => "AGENT_JOINED",
            Self::AgentLeft { .. } => "AGENT_LEFT",
            Self::Message { .. } => "MESSAGE",
            Self::Error { .. } => "ERROR",
            Self::RoomCreated { .. } => "ROOM_CREATED",
            Self::RoomList { .. } => "ROOM_LIST",
            Self::ProposalCreated { .. } => "PROPOSAL_CREATED",
            Self::VoteCast { .. } => "VOTE_CAST",
            Self::ProposalResolved { .. } => "PROPOSAL_RESOLVED",
            Self::AgentMetadataUpdated { .. } => "AGENT_METADATA_UPDATED",
            Self::ToolList { .. } => "TOOL_LIST",
            Self::ToolResult { .. } => "TOOL_RESULT",
        }
    }
}

/// Summary row in a ROOM_LIST reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub topic: String,
    pub mode: RoomMode,
    pub agent_count: usize,
}

/// Tool row in a TOOL_LIST reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
