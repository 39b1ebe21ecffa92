use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use agora_domain::{AgentMetadata, Error, Proposal, ProposalStatus, Result};

use crate::{MessageRecord, Repository, VoteRecord};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Journal entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ProposalEntry {
    Created {
        room_id: String,
        proposal: Proposal,
        at: DateTime<Utc>,
    },
    StatusChanged {
        proposal_id: String,
        status: ProposalStatus,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum MetadataEntry {
    Saved {
        room_id: String,
        agent_id: String,
        metadata: AgentMetadata,
        at: DateTime<Utc>,
    },
    Deleted {
        room_id: String,
        agent_id: String,
        at: DateTime<Utc>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JsonlRepository
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Append-only JSONL journal, one file per record kind under the state
/// directory. Replay and queries are a downstream concern; the engine
/// only ever appends.
pub struct JsonlRepository {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Persistence(format!("create {}: {e}", dir.display())))?;
        tracing::info!(path = %dir.display(), "jsonl repository ready");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| Error::Persistence(format!("encode {file}: {e}")))?;
        let path = self.dir.join(file);

        let _guard = self.write_lock.lock();
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Persistence(format!("open {}: {e}", path.display())))?;
        handle
            .write_all(line.as_bytes())
            .and_then(|_| handle.write_all(b"\n"))
            .map_err(|e| Error::Persistence(format!("append {}: {e}", path.display())))
    }
}

#[async_trait]
impl Repository for JsonlRepository {
    async fn save_message(&self, record: MessageRecord) -> Result<()> {
        self.append("messages.jsonl", &record)
    }

    async fn save_proposal(&self, room_id: &str, proposal: &Proposal) -> Result<()> {
        self.append(
            "proposals.jsonl",
            &ProposalEntry::Created {
                room_id: room_id.to_string(),
                proposal: proposal.clone(),
                at: Utc::now(),
            },
        )
    }

    async fn update_proposal_status(
        &self,
        proposal_id: &str,
        status: ProposalStatus,
    ) -> Result<()> {
        self.append(
            "proposals.jsonl",
            &ProposalEntry::StatusChanged {
                proposal_id: proposal_id.to_string(),
                status,
                at: Utc::now(),
            },
        )
    }

    async fn save_vote(&self, record: VoteRecord) -> Result<()> {
        self.append("votes.jsonl", &record)
    }

    async fn save_agent_metadata(
        &self,
        room_id: &str,
        agent_id: &str,
        metadata: &AgentMetadata,
    ) -> Result<()> {
        self.append(
            "metadata.jsonl",
            &MetadataEntry::Saved {
                room_id: room_id.to_string(),
                agent_id: agent_id.to_string(),
                metadata: metadata.clone(),
                at: Utc::now(),
            },
        )
    }

    async fn delete_agent_metadata(&self, agent_id: &str, room_id: &str) -> Result<()> {
        self.append(
            "metadata.jsonl",
            &MetadataEntry::Deleted {
                room_id: room_id.to_string(),
                agent_id: agent_id.to_string(),
                at: Utc::now(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_domain::{AgentDescriptor, AgentRole};

    fn record(content: &str) -> MessageRecord {
        MessageRecord {
            room_id: "r1".into(),
            agent: AgentDescriptor {
                id: "alice".into(),
                name: "Alice".into(),
                role: AgentRole::Architect,
            },
            content: content.into(),
            timestamp: 1,
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonlRepository::new(dir.path()).unwrap();

        repo.save_message(record("one")).await.unwrap();
        repo.save_message(record("two")).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("messages.jsonl")).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: MessageRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.content, "one");
    }

    #[tokio::test]
    async fn proposal_journal_carries_status_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonlRepository::new(dir.path()).unwrap();

        let proposal = Proposal::new("p1", "t", "d", "alice", "Alice", 0.6);
        repo.save_proposal("r1", &proposal).await.unwrap();
        repo.update_proposal_status("p1", ProposalStatus::Rejected)
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("proposals.jsonl")).unwrap();
        let entries: Vec<ProposalEntry> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert!(matches!(
            &entries[1],
            ProposalEntry::StatusChanged { proposal_id, status: ProposalStatus::Rejected, .. }
                if proposal_id == "p1"
        ));
    }

    #[tokio::test]
    async fn metadata_delete_is_a_tombstone() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonlRepository::new(dir.path()).unwrap();

        repo.save_agent_metadata("r1", "alice", &AgentMetadata::default())
            .await
            .unwrap();
        repo.delete_agent_metadata("alice", "r1").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("metadata.jsonl")).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.lines().nth(1).unwrap().contains("\"deleted\""));
    }
}
