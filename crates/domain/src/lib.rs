//! Shared domain types for the agora conference server.
//!
//! Everything here is transport-agnostic: agents, rooms modes, proposals,
//! discussion topics, configuration, and the shared error type. The wire
//! representation lives in `agora-protocol`.

pub mod agent;
pub mod config;
pub mod error;
pub mod mode;
pub mod proposal;
pub mod topic;

pub use agent::{AgentDescriptor, AgentMetadata, AgentRole, ToolTier};
pub use error::{Error, Result};
pub use mode::{ModeProfile, ResponseStyle, RoomMode};
pub use proposal::{Proposal, ProposalStatus, VoteChoice, VoteTally};
pub use topic::{DiscussionTopic, TopicList, TopicStatus};
