use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Votes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Abstain => "abstain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Derived vote counts. `total` includes abstentions; the consensus ratio
/// is computed over decisive (yes + no) votes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub yes: usize,
    pub no: usize,
    pub abstain: usize,
    pub total: usize,
}

impl VoteTally {
    pub fn decisive(&self) -> usize {
        self.yes + self.no
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Proposal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single motion under vote.
///
/// Votes mutate only while the proposal is `pending`; re-voting overwrites
/// the agent's previous choice. Once the consensus predicate fires the
/// status is terminal and further votes are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub proposer_id: String,
    pub proposer_name: String,
    /// Required share of decisive votes in favour, in `[0, 1]`.
    pub threshold: f64,
    pub votes: HashMap<String, VoteChoice>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Proposal {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        proposer_id: impl Into<String>,
        proposer_name: impl Into<String>,
        threshold: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            proposer_id: proposer_id.into(),
            proposer_name: proposer_name.into(),
            threshold,
            votes: HashMap::new(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn tally(&self) -> VoteTally {
        let mut tally = VoteTally {
            yes: 0,
            no: 0,
            abstain: 0,
            total: self.votes.len(),
        };
        for choice in self.votes.values() {
            match choice {
                VoteChoice::Yes => tally.yes += 1,
                VoteChoice::No => tally.no += 1,
                VoteChoice::Abstain => tally.abstain += 1,
            }
        }
        tally
    }

    /// Record or overwrite `agent_id`'s vote. Fails once the proposal has
    /// resolved.
    pub fn cast(&mut self, agent_id: &str, choice: VoteChoice) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::State(format!(
                "proposal {} already resolved ({})",
                self.id,
                self.status.as_str()
            )));
        }
        self.votes.insert(agent_id.to_string(), choice);
        Ok(())
    }

    /// Evaluate the consensus predicate against the current votes.
    ///
    /// With `D` decisive votes, consensus is reached when `Y/D >= threshold`
    /// (approved) or `N/D > 1 - threshold` (rejected). All-abstention
    /// proposals never resolve. A threshold of 1.0 therefore requires a
    /// unanimous yes, while any single no rejects.
    pub fn evaluate(&self) -> Option<ProposalStatus> {
        let tally = self.tally();
        let decisive = tally.decisive();
        if decisive == 0 {
            return None;
        }
        let yes_ratio = tally.yes as f64 / decisive as f64;
        let no_ratio = tally.no as f64 / decisive as f64;
        if yes_ratio >= self.threshold {
            Some(ProposalStatus::Approved)
        } else if no_ratio > 1.0 - self.threshold {
            Some(ProposalStatus::Rejected)
        } else {
            None
        }
    }

    /// Transition to a terminal status. Idempotent once resolved.
    pub fn resolve(&mut self, status: ProposalStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.resolved_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(threshold: f64) -> Proposal {
        Proposal::new("p1", "Use PostgreSQL", "…", "alice", "Alice", threshold)
    }

    #[test]
    fn new_proposal_is_pending() {
        let p = proposal(0.6);
        assert_eq!(p.status, ProposalStatus::Pending);
        assert!(p.evaluate().is_none());
    }

    #[test]
    fn majority_approves_at_deep_threshold() {
        let mut p = proposal(0.6);
        p.cast("bob", VoteChoice::Yes).unwrap();
        p.cast("charlie", VoteChoice::Yes).unwrap();
        p.cast("dave", VoteChoice::No).unwrap();
        p.cast("eve", VoteChoice::Abstain).unwrap();

        // 2/3 ≈ 0.67 ≥ 0.6
        assert_eq!(p.evaluate(), Some(ProposalStatus::Approved));
        let tally = p.tally();
        assert_eq!((tally.yes, tally.no, tally.abstain, tally.total), (2, 1, 1, 4));
    }

    #[test]
    fn split_vote_rejects_at_high_threshold() {
        let mut p = proposal(0.75);
        p.cast("a", VoteChoice::Yes).unwrap();
        p.cast("b", VoteChoice::Yes).unwrap();
        p.cast("c", VoteChoice::No).unwrap();
        p.cast("d", VoteChoice::No).unwrap();

        // 0.5 < 0.75 and 0.5 > 0.25
        assert_eq!(p.evaluate(), Some(ProposalStatus::Rejected));
    }

    #[test]
    fn abstentions_never_resolve() {
        let mut p = proposal(0.6);
        p.cast("a", VoteChoice::Abstain).unwrap();
        p.cast("b", VoteChoice::Abstain).unwrap();
        p.cast("c", VoteChoice::Abstain).unwrap();
        assert!(p.evaluate().is_none());
        assert_eq!(p.status, ProposalStatus::Pending);
    }

    #[test]
    fn unanimous_threshold_requires_no_dissent() {
        let mut p = proposal(1.0);
        p.cast("a", VoteChoice::Yes).unwrap();
        p.cast("b", VoteChoice::Yes).unwrap();
        assert_eq!(p.evaluate(), Some(ProposalStatus::Approved));

        let mut p = proposal(1.0);
        p.cast("a", VoteChoice::Yes).unwrap();
        p.cast("b", VoteChoice::No).unwrap();
        assert_eq!(p.evaluate(), Some(ProposalStatus::Rejected));
    }

    #[test]
    fn revote_overwrites() {
        let mut p = proposal(0.6);
        p.cast("a", VoteChoice::Yes).unwrap();
        p.cast("a", VoteChoice::No).unwrap();
        assert_eq!(p.votes.len(), 1);
        assert_eq!(p.votes["a"], VoteChoice::No);
    }

    #[test]
    fn resolved_proposal_rejects_votes() {
        let mut p = proposal(0.6);
        p.cast("a", VoteChoice::Yes).unwrap();
        p.resolve(ProposalStatus::Approved);
        assert!(p.cast("b", VoteChoice::No).is_err());
        assert_eq!(p.votes.len(), 1);
    }

    #[test]
    fn resolve_is_terminal() {
        let mut p = proposal(0.6);
        p.resolve(ProposalStatus::Approved);
        let resolved_at = p.resolved_at;
        p.resolve(ProposalStatus::Rejected);
        assert_eq!(p.status, ProposalStatus::Approved);
        assert_eq!(p.resolved_at, resolved_at);
    }

    #[test]
    fn self_vote_by_proposer_is_allowed() {
        let mut p = proposal(0.4);
        p.cast("alice", VoteChoice::Yes).unwrap();
        assert_eq!(p.evaluate(), Some(ProposalStatus::Approved));
    }
}
