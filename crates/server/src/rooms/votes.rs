//! Indexed proposal collection with lifecycle notification.
//!
//! The manager owns every proposal of one room and re-evaluates consensus
//! after each vote. It never broadcasts — the room forwards resolutions to
//! its members; registered listeners observe them for logging and tests.

use std::collections::HashMap;

use agora_domain::{Error, Proposal, ProposalStatus, Result, VoteChoice, VoteTally};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Emitted once when a proposal leaves `pending`.
#[derive(Debug, Clone)]
pub struct ResolutionEvent {
    pub proposal_id: String,
    pub status: ProposalStatus,
    pub tally: VoteTally,
}

pub type ListenerId = u64;
type Listener = Box<dyn Fn(&ResolutionEvent) + Send + Sync>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// VoteManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lives inside the room's critical section; all methods assume the
/// caller holds the room lock.
#[derive(Default)]
pub struct VoteManager {
    proposals: HashMap<String, Proposal>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl VoteManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proposal; duplicate ids fail without mutation.
    pub fn create_proposal(&mut self, proposal: Proposal) -> Result<()> {
        if self.proposals.contains_key(&proposal.id) {
            return Err(Error::State(format!(
                "proposal {} already exists",
                proposal.id
            )));
        }
        self.proposals.insert(proposal.id.clone(), proposal);
        Ok(())
    }

    pub fn get(&self, proposal_id: &str) -> Option<&Proposal> {
        self.proposals.get(proposal_id)
    }

    /// Record or overwrite a vote on a pending proposal.
    pub fn vote(
        &mut self,
        proposal_id: &str,
        agent_id: &str,
        choice: VoteChoice,
    ) -> Result<VoteTally> {
        let proposal = self
            .proposals
            .get_mut(proposal_id)
            .ok_or_else(|| Error::addressing("proposal", proposal_id))?;
        proposal.cast(agent_id, choice)?;
        Ok(proposal.tally())
    }

    /// The observer call after each vote: evaluate the consensus
    /// predicate and, on the first satisfaction, transition the status
    /// and notify listeners in registration order.
    pub fn update_proposal_status(&mut self, proposal_id: &str) -> Result<Option<ResolutionEvent>> {
        let proposal = self
            .proposals
            .get_mut(proposal_id)
            .ok_or_else(|| Error::addressing("proposal", proposal_id))?;
        if proposal.status.is_terminal() {
            return Ok(None);
        }
        let Some(status) = proposal.evaluate() else {
            return Ok(None);
        };
        proposal.resolve(status);
        let event = ResolutionEvent {
            proposal_id: proposal.id.clone(),
            status,
            tally: proposal.tally(),
        };
        for (_, listener) in &self.listeners {
            listener(&event);
        }
        Ok(Some(event))
    }

    pub fn proposals_by_status(&self, status: ProposalStatus) -> Vec<&Proposal> {
        let mut matching: Vec<&Proposal> = self
            .proposals
            .values()
            .filter(|p| p.status == status)
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        matching
    }

    pub fn delete_proposal(&mut self, proposal_id: &str) -> bool {
        self.proposals.remove(proposal_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Register a resolution listener; listeners fire in registration
    /// order until removed.
    pub fn on_resolution(&mut self, listener: impl Fn(&ResolutionEvent) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }
}
