//! One conversation scope.
//!
//! Every mutation of room state happens under the room's async mutex,
//! which is the only serialization the protocol requires — rooms are
//! independent of each other. Member sinks are bounded queues written
//! with `try_send`, so one slow subscriber can never stall the room; an
//! overflowing connection is closed, which the server treats as an
//! implicit LEAVE.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;

use agora_bus::MessageBus;
use agora_domain::{
    AgentDescriptor, AgentMetadata, AgentRole, DiscussionTopic, Proposal, Result, RoomMode,
    TopicList, VoteChoice,
};
use agora_domain::topic::TopicSummary;
use agora_protocol::{now_ms, BusEnvelope, ClientCommand, RoomInfo, ServerEvent};
use agora_store::{MessageRecord, Repository, VoteRecord};
use agora_tools::ToolRegistry;

use super::votes::VoteManager;
use super::ClientSink;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Member {
    descriptor: AgentDescriptor,
    metadata: Option<AgentMetadata>,
    sink: ClientSink,
}

struct RoomState {
    /// Unique by agent id.
    members: HashMap<String, Member>,
    /// Connection → agent, for disconnect handling.
    conn_index: HashMap<u64, String>,
    votes: VoteManager,
    topics: TopicList,
    /// Bus message ids already delivered to this room.
    seen_ids: LruCache<String, ()>,
    /// Message ids this room minted, to filter self-echo.
    own_ids: LruCache<String, ()>,
}

/// Knobs a room inherits from server configuration.
#[derive(Debug, Clone)]
pub struct RoomOptions {
    pub server_id: String,
    pub seen_id_limit: usize,
    pub reap_on_empty: bool,
}

pub type ShutdownHook = Box<dyn FnOnce(&str) + Send>;

pub struct Room {
    id: String,
    topic: String,
    mode: RoomMode,
    server_id: String,
    reap_on_empty: bool,
    repo: Arc<dyn Repository>,
    bus: Option<Arc<dyn MessageBus>>,
    tools: ToolRegistry,
    state: Mutex<RoomState>,
    on_shutdown: SyncMutex<Option<ShutdownHook>>,
    shut: AtomicBool,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("mode", &self.mode)
            .field("server_id", &self.server_id)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Construction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Room {
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        mode: RoomMode,
        repo: Arc<dyn Repository>,
        bus: Option<Arc<dyn MessageBus>>,
        tools: ToolRegistry,
        options: RoomOptions,
    ) -> Arc<Self> {
        let id = id.into();
        let topic = topic.into();
        let cap = NonZeroUsize::new(options.seen_id_limit.max(1)).unwrap_or(NonZeroUsize::MIN);

        let mut votes = VoteManager::new();
        {
            let room_id = id.clone();
            votes.on_resolution(move |event| {
                tracing::info!(
                    room = %room_id,
                    proposal = %event.proposal_id,
                    status = event.status.as_str(),
                    yes = event.tally.yes,
                    no = event.tally.no,
                    abstain = event.tally.abstain,
                    "proposal resolved"
                );
            });
        }

        Arc::new(Self {
            server_id: options.server_id,
            reap_on_empty: options.reap_on_empty,
            repo,
            bus,
            tools,
            state: Mutex::new(RoomState {
                members: HashMap::new(),
                conn_index: HashMap::new(),
                votes,
                topics: TopicList::new(topic.clone()),
                seen_ids: LruCache::new(cap),
                own_ids: LruCache::new(cap),
            }),
            on_shutdown: SyncMutex::new(None),
            shut: AtomicBool::new(false),
            id,
            topic,
            mode,
        })
    }

    /// Install the callback invoked exactly once when the room shuts down.
    pub fn set_shutdown_hook(&self, hook: ShutdownHook) {
        *self.on_shutdown.lock() = Some(hook);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn mode(&self) -> RoomMode {
        self.mode
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn is_shut(&self) -> bool {
        self.shut.load(Ordering::SeqCst)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Command routing
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn handle_command(&self, sink: &ClientSink, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Join {
                agent_id,
                agent_name,
                role,
                metadata,
                ..
            } => {
                self.join(sink.clone(), agent_id, agent_name, role, metadata)
                    .await;
            }
            ClientCommand::Leave { agent_id, .. } | ClientCommand::LeaveRoom { agent_id, .. } => {
                self.leave(sink.conn_id(), &agent_id).await;
            }
            ClientCommand::Message {
                agent_id,
                content,
                timestamp,
            } => self.handle_message(&agent_id, content, timestamp).await,
            ClientCommand::CreateProposal {
                agent_id,
                proposal_id,
                title,
                description,
                threshold,
                ..
            } => {
                self.handle_create_proposal(sink, &agent_id, proposal_id, title, description, threshold)
                    .await
            }
            ClientCommand::Vote {
                agent_id,
                proposal_id,
                vote,
                rationale,
                timestamp,
            } => {
                self.handle_vote(sink, &agent_id, &proposal_id, vote, rationale, timestamp)
                    .await
            }
            ClientCommand::UpdateMetadata {
                agent_id, metadata, ..
            } => self.handle_update_metadata(sink, &agent_id, metadata).await,
            ClientCommand::ListTools { agent_id, .. } => {
                self.handle_list_tools(sink, &agent_id).await
            }
            ClientCommand::InvokeTool {
                agent_id, tool, ..
            } => self.handle_invoke_tool(sink, &agent_id, &tool).await,
            ClientCommand::CreateRoom { .. } | ClientCommand::ListRooms { .. } => {
                sink.send(ServerEvent::error("command is not valid inside a room", now_ms()));
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Membership
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// JOIN: register the agent, welcome the joiner, announce to the rest.
    /// Returns `false` without mutating state when the agent id is taken.
    pub async fn join(
        &self,
        sink: ClientSink,
        agent_id: String,
        agent_name: String,
        role: AgentRole,
        metadata: Option<AgentMetadata>,
    ) -> bool {
        if self.is_shut() {
            sink.send(ServerEvent::error("room is shut down", now_ms()));
            return false;
        }

        {
            let mut state = self.state.lock().await;
            if state.members.contains_key(&agent_id) {
                sink.send(ServerEvent::error("agent already exists", now_ms()));
                return false;
            }
            if state.conn_index.contains_key(&sink.conn_id()) {
                sink.send(ServerEvent::error("connection already joined a room", now_ms()));
                return false;
            }

            let tool_names: Vec<String> = self
                .tools
                .list_for(&agent_id, &role)
                .into_iter()
                .map(|t| t.name)
                .collect();

            let descriptor = AgentDescriptor {
                id: agent_id.clone(),
                name: agent_name.clone(),
                role: role.clone(),
            };
            state.conn_index.insert(sink.conn_id(), agent_id.clone());
            state.members.insert(
                agent_id.clone(),
                Member {
                    descriptor,
                    metadata: metadata.clone(),
                    sink: sink.clone(),
                },
            );

            let welcome = ServerEvent::Welcome {
                room_id: self.id.clone(),
                topic: self.topic.clone(),
                mode: self.mode,
                agent_count: state.members.len(),
                tools: tool_names,
                timestamp: now_ms(),
            };
            if !sink.send(welcome) {
                tracing::warn!(room = %self.id, agent = %agent_id, "joiner overflowed, closing");
                sink.close();
            }

            let joined = ServerEvent::AgentJoined {
                id: agent_id.clone(),
                name: agent_name,
                role,
                metadata: metadata.clone(),
                timestamp: now_ms(),
            };
            self.broadcast(&mut state, &joined, Some(agent_id.as_str()));
        }

        if let Some(meta) = &metadata {
            if let Err(e) = self.repo.save_agent_metadata(&self.id, &agent_id, meta).await {
                tracing::warn!(room = %self.id, agent = %agent_id, error = %e, "metadata not persisted");
            }
        }

        tracing::info!(room = %self.id, agent = %agent_id, "agent joined");
        true
    }

    /// LEAVE, and the tail half of a disconnect. Returns `false` when the
    /// agent is not a member of this room on this connection.
    pub async fn leave(&self, conn_id: u64, agent_id: &str) -> bool {
        let left = {
            let mut state = self.state.lock().await;
            match state.members.get(agent_id) {
                Some(member) if member.sink.conn_id() == conn_id => {}
                _ => return false,
            }
            let member = state.members.remove(agent_id).expect("member checked above");
            state.conn_index.remove(&conn_id);

            let event = ServerEvent::AgentLeft {
                id: agent_id.to_string(),
                name: member.descriptor.name.clone(),
                timestamp: now_ms(),
            };
            self.broadcast(&mut state, &event, None);
            state.members.is_empty()
        };

        if let Err(e) = self.repo.delete_agent_metadata(agent_id, &self.id).await {
            tracing::warn!(room = %self.id, agent = %agent_id, error = %e, "metadata not deleted");
        }
        tracing::info!(room = %self.id, agent = %agent_id, "agent left");

        if left && self.reap_on_empty {
            self.shutdown().await;
        }
        true
    }

    /// Closing a connection is equivalent to an explicit LEAVE.
    pub async fn handle_disconnect(&self, conn_id: u64) {
        let agent_id = {
            let state = self.state.lock().await;
            state.conn_index.get(&conn_id).cloned()
        };
        if let Some(agent_id) = agent_id {
            self.leave(conn_id, &agent_id).await;
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Chat
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// MESSAGE: fan out to everyone except the sender, persist, and
    /// publish to the bus when one is attached. An unknown sender is
    /// dropped silently — it usually means the agent just left.
    async fn handle_message(&self, agent_id: &str, content: String, timestamp: i64) {
        let (record, envelope) = {
            let mut state = self.state.lock().await;
            let Some(member) = state.members.get(agent_id) else {
                tracing::debug!(room = %self.id, agent = %agent_id, "message from unknown agent dropped");
                return;
            };
            let descriptor = member.descriptor.clone();

            let event = ServerEvent::Message {
                room_id: self.id.clone(),
                agent_id: descriptor.id.clone(),
                agent_name: descriptor.name.clone(),
                role: descriptor.role.clone(),
                content: content.clone(),
                timestamp,
            };
            self.broadcast(&mut state, &event, Some(agent_id));

            let envelope = self.bus.as_ref().map(|_| {
                let envelope = BusEnvelope::new(&self.server_id, timestamp, event.clone());
                state.own_ids.put(envelope.message_id.clone(), ());
                envelope
            });

            let record = MessageRecord {
                room_id: self.id.clone(),
                agent: descriptor,
                content,
                timestamp,
                stored_at: Utc::now(),
            };
            (record, envelope)
        };

        // Liveness over durability: the fan-out already happened.
        if let Err(e) = self.repo.save_message(record).await {
            tracing::warn!(room = %self.id, error = %e, "message not persisted");
        }

        if let (Some(bus), Some(envelope)) = (&self.bus, envelope) {
            if let Err(e) = bus.publish(envelope) {
                tracing::warn!(room = %self.id, error = %e, "bus publish failed");
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Federation ingress
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Ingest one bus envelope: drop echoes and duplicates, accept only
    /// MESSAGE payloads, then persist and fan out locally.
    pub async fn handle_bus(&self, envelope: BusEnvelope) {
        if envelope.server_id == self.server_id {
            return;
        }

        let record = {
            let mut state = self.state.lock().await;
            if state.own_ids.contains(&envelope.message_id)
                || state.seen_ids.contains(&envelope.message_id)
            {
                return;
            }
            state.seen_ids.put(envelope.message_id.clone(), ());

            let ServerEvent::Message {
                room_id,
                agent_id,
                agent_name,
                role,
                content,
                timestamp,
            } = &envelope.payload
            else {
                tracing::debug!(
                    room = %self.id,
                    kind = envelope.payload.kind(),
                    "dropping non-message bus payload"
                );
                return;
            };
            if room_id != &self.id {
                return;
            }

            // A local member with the sender's id must not hear itself.
            self.broadcast(&mut state, &envelope.payload, Some(agent_id.as_str()));

            MessageRecord {
                room_id: room_id.clone(),
                agent: AgentDescriptor {
                    id: agent_id.clone(),
                    name: agent_name.clone(),
                    role: role.clone(),
                },
                content: content.clone(),
                timestamp: *timestamp,
                stored_at: Utc::now(),
            }
        };

        if let Err(e) = self.repo.save_message(record).await {
            tracing::warn!(room = %self.id, error = %e, "federated message not persisted");
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Proposals
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn handle_create_proposal(
        &self,
        sink: &ClientSink,
        agent_id: &str,
        proposal_id: Option<String>,
        title: String,
        description: String,
        threshold: Option<f64>,
    ) {
        let proposal = {
            let mut state = self.state.lock().await;
            let Some(member) = state.members.get(agent_id) else {
                sink.send(ServerEvent::error("unknown agent", now_ms()));
                return;
            };
            let proposer_name = member.descriptor.name.clone();

            let proposal = Proposal::new(
                proposal_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                title,
                description,
                agent_id,
                proposer_name,
                threshold.unwrap_or_else(|| self.mode.default_threshold()),
            );
            if let Err(e) = state.votes.create_proposal(proposal.clone()) {
                sink.send(ServerEvent::error(e.to_string(), now_ms()));
                return;
            }

            let event = ServerEvent::ProposalCreated {
                proposal_id: proposal.id.clone(),
                title: proposal.title.clone(),
                description: proposal.description.clone(),
                proposer_id: proposal.proposer_id.clone(),
                proposer_name: proposal.proposer_name.clone(),
                threshold: proposal.threshold,
                timestamp: now_ms(),
            };
            self.broadcast(&mut state, &event, None);
            proposal
        };

        if let Err(e) = self.repo.save_proposal(&self.id, &proposal).await {
            tracing::warn!(room = %self.id, proposal = %proposal.id, error = %e, "proposal not persisted");
            sink.send(ServerEvent::error(format!("proposal not persisted: {e}"), now_ms()));
        }
    }

    /// VOTE: record or overwrite, broadcast VOTE_CAST, then re-evaluate
    /// consensus. Evaluation waits until every member other than the
    /// proposer has voted, so a lone early yes cannot decide for a room
    /// that is still reading.
    async fn handle_vote(
        &self,
        sink: &ClientSink,
        agent_id: &str,
        proposal_id: &str,
        choice: VoteChoice,
        rationale: Option<String>,
        timestamp: i64,
    ) {
        let (voter_name, resolution) = {
            let mut state = self.state.lock().await;
            let Some(member) = state.members.get(agent_id) else {
                sink.send(ServerEvent::error("unknown agent", now_ms()));
                return;
            };
            let voter_name = member.descriptor.name.clone();

            if let Err(e) = state.votes.vote(proposal_id, agent_id, choice) {
                sink.send(ServerEvent::error(e.to_string(), now_ms()));
                return;
            }

            let cast = ServerEvent::VoteCast {
                proposal_id: proposal_id.to_string(),
                agent_id: agent_id.to_string(),
                agent_name: voter_name.clone(),
                vote: choice,
                rationale: rationale.clone(),
                timestamp,
            };
            self.broadcast(&mut state, &cast, None);

            let everyone_voted = {
                let proposal = state.votes.get(proposal_id).expect("voted above");
                state
                    .members
                    .keys()
                    .all(|id| *id == proposal.proposer_id || proposal.votes.contains_key(id))
            };
            let resolution = if everyone_voted {
                state
                    .votes
                    .update_proposal_status(proposal_id)
                    .ok()
                    .flatten()
            } else {
                None
            };

            if let Some(resolution) = &resolution {
                let event = ServerEvent::ProposalResolved {
                    proposal_id: resolution.proposal_id.clone(),
                    status: resolution.status,
                    yes: resolution.tally.yes,
                    no: resolution.tally.no,
                    abstain: resolution.tally.abstain,
                    total: resolution.tally.total,
                    timestamp: now_ms(),
                };
                self.broadcast(&mut state, &event, None);
            }
            (voter_name, resolution)
        };

        let mut persist_error = None;
        let record = VoteRecord {
            proposal_id: proposal_id.to_string(),
            agent_id: agent_id.to_string(),
            agent_name: voter_name,
            choice,
            rationale,
            timestamp,
            stored_at: Utc::now(),
        };
        if let Err(e) = self.repo.save_vote(record).await {
            persist_error = Some(e);
        }
        if let Some(resolution) = &resolution {
            if let Err(e) = self
                .repo
                .update_proposal_status(proposal_id, resolution.status)
                .await
            {
                persist_error = Some(e);
            }
        }
        if let Some(e) = persist_error {
            tracing::warn!(room = %self.id, proposal = %proposal_id, error = %e, "vote not persisted");
            sink.send(ServerEvent::error(format!("vote not persisted: {e}"), now_ms()));
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Metadata
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// UPDATE_METADATA replaces the record and broadcasts to every
    /// member, the sender included, so distributed views stay aligned.
    async fn handle_update_metadata(
        &self,
        sink: &ClientSink,
        agent_id: &str,
        metadata: AgentMetadata,
    ) {
        {
            let mut state = self.state.lock().await;
            let Some(member) = state.members.get_mut(agent_id) else {
                sink.send(ServerEvent::error("unknown agent", now_ms()));
                return;
            };
            member.metadata = Some(metadata.clone());

            let event = ServerEvent::AgentMetadataUpdated {
                agent_id: agent_id.to_string(),
                metadata: metadata.clone(),
                timestamp: now_ms(),
            };
            self.broadcast(&mut state, &event, None);
        }

        if let Err(e) = self
            .repo
            .save_agent_metadata(&self.id, agent_id, &metadata)
            .await
        {
            tracing::warn!(room = %self.id, agent = %agent_id, error = %e, "metadata not persisted");
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Tools
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn handle_list_tools(&self, sink: &ClientSink, agent_id: &str) {
        let role = {
            let state = self.state.lock().await;
            match state.members.get(agent_id) {
                Some(member) => member.descriptor.role.clone(),
                None => {
                    sink.send(ServerEvent::error("unknown agent", now_ms()));
                    return;
                }
            }
        };
        let tools = self
            .tools
            .list_for(agent_id, &role)
            .into_iter()
            .map(|t| agora_protocol::ToolInfo {
                name: t.name,
                description: t.description,
            })
            .collect();
        sink.send(ServerEvent::ToolList {
            tools,
            timestamp: now_ms(),
        });
    }

    /// INVOKE_TOOL: permission and rate-limit gate plus usage accounting.
    /// Execution itself belongs to the agents; the server acknowledges
    /// an admitted invocation.
    async fn handle_invoke_tool(&self, sink: &ClientSink, agent_id: &str, tool: &str) {
        let role = {
            let state = self.state.lock().await;
            match state.members.get(agent_id) {
                Some(member) => member.descriptor.role.clone(),
                None => {
                    sink.send(ServerEvent::error("unknown agent", now_ms()));
                    return;
                }
            }
        };

        match self.tools.begin_invocation(tool, agent_id, &role) {
            Ok(guard) => {
                self.tools.complete(guard, true);
                sink.send(ServerEvent::ToolResult {
                    tool: tool.to_string(),
                    agent_id: agent_id.to_string(),
                    success: true,
                    result: None,
                    error: None,
                    timestamp: now_ms(),
                });
            }
            Err(denied) => {
                sink.send(ServerEvent::ToolResult {
                    tool: tool.to_string(),
                    agent_id: agent_id.to_string(),
                    success: false,
                    result: None,
                    error: Some(denied.to_string()),
                    timestamp: now_ms(),
                });
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Topics
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn add_topic(&self, title: &str, introduced_by: Option<String>) -> String {
        self.state.lock().await.topics.add(title, introduced_by)
    }

    pub async fn set_active_topic(&self, topic_id: &str) -> Result<()> {
        self.state.lock().await.topics.set_active(topic_id)
    }

    pub async fn complete_topic(&self, topic_id: &str) -> Result<()> {
        self.state.lock().await.topics.complete(topic_id)
    }

    pub async fn active_topic(&self) -> Option<DiscussionTopic> {
        self.state.lock().await.topics.active().cloned()
    }

    pub async fn topic_summary(&self) -> TopicSummary {
        self.state.lock().await.topics.summary()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Shutdown & accessors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Close every member connection and fire the shutdown hook.
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.shut.swap(true, Ordering::SeqCst) {
            return;
        }
        let sinks: Vec<ClientSink> = {
            let mut state = self.state.lock().await;
            state.conn_index.clear();
            state.members.drain().map(|(_, m)| m.sink).collect()
        };
        for sink in sinks {
            sink.close();
        }
        if let Some(hook) = self.on_shutdown.lock().take() {
            hook(&self.id);
        }
        tracing::info!(room = %self.id, "room shut down");
    }

    pub async fn agent_count(&self) -> usize {
        self.state.lock().await.members.len()
    }

    pub async fn member_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().await.members.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn proposal(&self, proposal_id: &str) -> Option<Proposal> {
        self.state.lock().await.votes.get(proposal_id).cloned()
    }

    pub async fn member_metadata(&self, agent_id: &str) -> Option<AgentMetadata> {
        self.state
            .lock()
            .await
            .members
            .get(agent_id)
            .and_then(|m| m.metadata.clone())
    }

    pub async fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id.clone(),
            topic: self.topic.clone(),
            mode: self.mode,
            agent_count: self.agent_count().await,
        }
    }

    // ── Private ──────────────────────────────────────────────────────

    /// Enqueue `event` to every member except `skip`. An overflowing
    /// sink gets its connection closed; the disconnect path removes the
    /// member like any other LEAVE.
    fn broadcast(&self, state: &mut RoomState, event: &ServerEvent, skip: Option<&str>) {
        for (agent_id, member) in state.members.iter() {
            if skip == Some(agent_id.as_str()) {
                continue;
            }
            if !member.sink.send(event.clone()) {
                tracing::warn!(
                    room = %self.id,
                    agent = %agent_id,
                    "send buffer overflow, closing connection"
                );
                member.sink.close();
            }
        }
    }
}
