//! Durable record access behind the coordination engine.
//!
//! The engine persists messages, proposals, votes, and agent metadata
//! through the [`Repository`] trait and never reads them back on the hot
//! path — queries belong to exporters and dashboards outside this
//! workspace. Two implementations ship here: [`MemoryRepository`] for
//! tests and single-shot runs, and [`JsonlRepository`], an append-only
//! JSONL journal under a state directory.

mod jsonl;
mod memory;

pub use jsonl::JsonlRepository;
pub use memory::{FailingRepository, MemoryRepository};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agora_domain::{AgentDescriptor, AgentMetadata, Proposal, ProposalStatus, Result, VoteChoice};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One persisted chat message, with the sender's identity snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub room_id: String,
    pub agent: AgentDescriptor,
    pub content: String,
    /// Client wire timestamp (ms).
    pub timestamp: i64,
    pub stored_at: DateTime<Utc>,
}

/// One persisted vote event. The rationale is preserved verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub choice: VoteChoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub timestamp: i64,
    pub stored_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Repository trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Write-side persistence consumed by rooms.
///
/// Implementations must be safe for concurrent use: every room shares
/// one repository handle.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn save_message(&self, record: MessageRecord) -> Result<()>;

    /// Persist a full proposal snapshot at creation time.
    async fn save_proposal(&self, room_id: &str, proposal: &Proposal) -> Result<()>;

    async fn update_proposal_status(&self, proposal_id: &str, status: ProposalStatus)
        -> Result<()>;

    async fn save_vote(&self, record: VoteRecord) -> Result<()>;

    async fn save_agent_metadata(
        &self,
        room_id: &str,
        agent_id: &str,
        metadata: &AgentMetadata,
    ) -> Result<()>;

    async fn delete_agent_metadata(&self, agent_id: &str, room_id: &str) -> Result<()>;
}
