use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use agora_domain::{AgentMetadata, Error, Proposal, ProposalStatus, Result};

use crate::{MessageRecord, Repository, VoteRecord};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryRepository
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory repository. The query accessors exist for tests and are
/// not part of the write-side contract rooms rely on.
#[derive(Default)]
pub struct MemoryRepository {
    messages: RwLock<Vec<MessageRecord>>,
    proposals: RwLock<Vec<(String, Proposal)>>,
    statuses: RwLock<HashMap<String, ProposalStatus>>,
    votes: RwLock<Vec<VoteRecord>>,
    metadata: RwLock<HashMap<(String, String), AgentMetadata>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<MessageRecord> {
        self.messages.read().clone()
    }

    pub fn messages_for_room(&self, room_id: &str) -> Vec<MessageRecord> {
        self.messages
            .read()
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect()
    }

    pub fn votes(&self) -> Vec<VoteRecord> {
        self.votes.read().clone()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.read().len()
    }

    pub fn proposal_status(&self, proposal_id: &str) -> Option<ProposalStatus> {
        self.statuses.read().get(proposal_id).copied()
    }

    pub fn metadata_for(&self, room_id: &str, agent_id: &str) -> Option<AgentMetadata> {
        self.metadata
            .read()
            .get(&(room_id.to_string(), agent_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn save_message(&self, record: MessageRecord) -> Result<()> {
        self.messages.write().push(record);
        Ok(())
    }

    async fn save_proposal(&self, room_id: &str, proposal: &Proposal) -> Result<()> {
        self.proposals
            .write()
            .push((room_id.to_string(), proposal.clone()));
        self.statuses
            .write()
            .insert(proposal.id.clone(), proposal.status);
        Ok(())
    }

    async fn update_proposal_status(
        &self,
        proposal_id: &str,
        status: ProposalStatus,
    ) -> Result<()> {
        self.statuses.write().insert(proposal_id.to_string(), status);
        Ok(())
    }

    async fn save_vote(&self, record: VoteRecord) -> Result<()> {
        self.votes.write().push(record);
        Ok(())
    }

    async fn save_agent_metadata(
        &self,
        room_id: &str,
        agent_id: &str,
        metadata: &AgentMetadata,
    ) -> Result<()> {
        self.metadata
            .write()
            .insert((room_id.to_string(), agent_id.to_string()), metadata.clone());
        Ok(())
    }

    async fn delete_agent_metadata(&self, agent_id: &str, room_id: &str) -> Result<()> {
        self.metadata
            .write()
            .remove(&(room_id.to_string(), agent_id.to_string()));
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FailingRepository
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Test double whose every write fails, for exercising the
/// persistence-error policy (chat fan-out proceeds, proposal
/// transitions surface the error).
#[derive(Default)]
pub struct FailingRepository;

impl FailingRepository {
    fn fail<T>(&self, op: &str) -> Result<T> {
        Err(Error::Persistence(format!("{op}: storage unavailable")))
    }
}

#[async_trait]
impl Repository for FailingRepository {
    async fn save_message(&self, _record: MessageRecord) -> Result<()> {
        self.fail("save_message")
    }

    async fn save_proposal(&self, _room_id: &str, _proposal: &Proposal) -> Result<()> {
        self.fail("save_proposal")
    }

    async fn update_proposal_status(
        &self,
        _proposal_id: &str,
        _status: ProposalStatus,
    ) -> Result<()> {
        self.fail("update_proposal_status")
    }

    async fn save_vote(&self, _record: VoteRecord) -> Result<()> {
        self.fail("save_vote")
    }

    async fn save_agent_metadata(
        &self,
        _room_id: &str,
        _agent_id: &str,
        _metadata: &AgentMetadata,
    ) -> Result<()> {
        self.fail("save_agent_metadata")
    }

    async fn delete_agent_metadata(&self, _agent_id: &str, _room_id: &str) -> Result<()> {
        self.fail("delete_agent_metadata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_domain::{AgentDescriptor, AgentRole, VoteChoice};
    use chrono::Utc;

    fn message(room_id: &str, agent_id: &str, content: &str) -> MessageRecord {
        MessageRecord {
            room_id: room_id.into(),
            agent: AgentDescriptor {
                id: agent_id.into(),
                name: agent_id.into(),
                role: AgentRole::Participant,
            },
            content: content.into(),
            timestamp: 1,
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn saves_and_queries_by_room() {
        let repo = MemoryRepository::new();
        repo.save_message(message("r1", "alice", "hi")).await.unwrap();
        repo.save_message(message("r2", "bob", "yo")).await.unwrap();

        assert_eq!(repo.messages().len(), 2);
        let r1 = repo.messages_for_room("r1");
        assert_eq!(r1.len(), 1);
        assert_eq!(r1[0].content, "hi");
    }

    #[tokio::test]
    async fn proposal_status_tracks_updates() {
        let repo = MemoryRepository::new();
        let proposal = Proposal::new("p1", "t", "d", "alice", "Alice", 0.6);
        repo.save_proposal("r1", &proposal).await.unwrap();
        assert_eq!(repo.proposal_status("p1"), Some(ProposalStatus::Pending));

        repo.update_proposal_status("p1", ProposalStatus::Approved)
            .await
            .unwrap();
        assert_eq!(repo.proposal_status("p1"), Some(ProposalStatus::Approved));
    }

    #[tokio::test]
    async fn metadata_delete_removes_entry() {
        let repo = MemoryRepository::new();
        repo.save_agent_metadata("r1", "alice", &AgentMetadata::default())
            .await
            .unwrap();
        assert!(repo.metadata_for("r1", "alice").is_some());

        repo.delete_agent_metadata("alice", "r1").await.unwrap();
        assert!(repo.metadata_for("r1", "alice").is_none());
    }

    #[tokio::test]
    async fn failing_repository_fails_everything() {
        let repo = FailingRepository;
        assert!(repo.save_message(message("r", "a", "x")).await.is_err());
        assert!(repo
            .save_vote(VoteRecord {
                proposal_id: "p".into(),
                agent_id: "a".into(),
                agent_name: "A".into(),
                choice: VoteChoice::Yes,
                rationale: None,
                timestamp: 1,
                stored_at: Utc::now(),
            })
            .await
            .is_err());
    }
}
