use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Roles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Role an agent plays in a discussion.
///
/// The well-known roles get variants; anything else rides along as
/// `Custom` — the wire format is a free-form string either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Architect,
    Critic,
    Pragmatist,
    Moderator,
    Participant,
    Expert,
    Admin,
    Custom(String),
}

impl AgentRole {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "architect" => Self::Architect,
            "critic" => Self::Critic,
            "pragmatist" => Self::Pragmatist,
            "moderator" => Self::Moderator,
            "participant" => Self::Participant,
            "expert" => Self::Expert,
            "admin" => Self::Admin,
            _ => Self::Custom(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Architect => "architect",
            Self::Critic => "critic",
            Self::Pragmatist => "pragmatist",
            Self::Moderator => "moderator",
            Self::Participant => "participant",
            Self::Expert => "expert",
            Self::Admin => "admin",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AgentRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AgentRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool tiers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Access tier for a room tool.
///
/// Tiers are set-membership tests against the caller's role, not an
/// ordered lattice: `all` and `participant` admit everyone, `expert`
/// admits architects and experts, `moderator` and `admin` admit exactly
/// that role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTier {
    All,
    Participant,
    Expert,
    Moderator,
    Admin,
}

impl ToolTier {
    pub fn admits(&self, role: &AgentRole) -> bool {
        match self {
            Self::All | Self::Participant => true,
            Self::Expert => matches!(role, AgentRole::Architect | AgentRole::Expert),
            Self::Moderator => matches!(role, AgentRole::Moderator),
            Self::Admin => matches!(role, AgentRole::Admin),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Agent metadata blob.
///
/// The server carries this through JOIN / UPDATE_METADATA and persists it,
/// but never interprets it. Unknown fields ride along verbatim so newer
/// agents can exchange richer profiles through older servers.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AgentMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Identity snapshot of an agent, as persisted alongside messages and votes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub role: AgentRole,
}
