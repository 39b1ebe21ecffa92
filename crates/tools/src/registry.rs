use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use agora_domain::config::ToolConfig;
use agora_domain::{AgentRole, ToolTier};

use crate::limits::{LimitExceeded, LimitTracker, RateLimit};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool specs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Access policy for one tool.
///
/// Precedence: the deny list always wins; a non-empty allow list decides
/// alone; a non-empty role list can veto; a tier narrows what remains;
/// with nothing configured everyone qualifies.
#[derive(Debug, Clone, Default)]
pub struct ToolPermissions {
    pub allowed_agents: HashSet<String>,
    pub denied_agents: HashSet<String>,
    /// Free-form role strings, compared case-insensitively.
    pub allowed_roles: HashSet<String>,
    pub tier: Option<ToolTier>,
}

impl ToolPermissions {
    pub fn allows(&self, agent_id: &str, role: &AgentRole) -> bool {
        if self.denied_agents.contains(agent_id) {
            return false;
        }
        if !self.allowed_agents.is_empty() {
            return self.allowed_agents.contains(agent_id);
        }
        if !self.allowed_roles.is_empty()
            && !self
                .allowed_roles
                .iter()
                .any(|r| r.eq_ignore_ascii_case(role.as_str()))
        {
            return false;
        }
        if let Some(tier) = self.tier {
            return tier.admits(role);
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub permissions: ToolPermissions,
    pub rate_limit: Option<RateLimit>,
    pub enabled: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            permissions: ToolPermissions::default(),
            rate_limit: None,
            enabled: true,
        }
    }

    pub fn from_config(cfg: &ToolConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            description: cfg.description.clone(),
            permissions: ToolPermissions {
                allowed_agents: cfg.allowed_agents.iter().cloned().collect(),
                denied_agents: cfg.denied_agents.iter().cloned().collect(),
                allowed_roles: cfg.allowed_roles.iter().cloned().collect(),
                tier: cfg.tier,
            },
            rate_limit: cfg.rate_limit.map(RateLimit::from),
            enabled: cfg.enabled,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Usage accounting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolUsage {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
    pub last_invoked_at: Option<DateTime<Utc>>,
}

/// Why an invocation was refused.
#[derive(Debug, Clone, Copy)]
pub enum InvocationDenied {
    UnknownTool,
    Disabled,
    Permission,
    RateLimited(LimitExceeded),
}

impl fmt::Display for InvocationDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool => write!(f, "unknown tool"),
            Self::Disabled => write!(f, "tool is disabled"),
            Self::Permission => write!(f, "permission denied"),
            Self::RateLimited(e) => write!(f, "rate limited: {e}"),
        }
    }
}

/// Proof of admission. Hand it back via [`ToolRegistry::complete`] to
/// record the outcome and release the concurrent slot.
#[must_use = "complete() the invocation to release its concurrent slot"]
pub struct InvocationGuard {
    tool: String,
    agent_id: String,
    started: Instant,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One registry per room. Registration order is preserved for listings.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<ToolSpec>>,
    usage: Mutex<HashMap<(String, String), ToolUsage>>,
    limits: LimitTracker,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[ToolConfig]) -> Self {
        let registry = Self::new();
        for cfg in configs {
            registry.register(ToolSpec::from_config(cfg));
        }
        registry
    }

    /// Register a tool; a later spec with the same name replaces the
    /// earlier one in place.
    pub fn register(&self, spec: ToolSpec) {
        tracing::debug!(tool = %spec.name, enabled = spec.enabled, "tool registered");
        let mut tools = self.tools.write();
        if let Some(existing) = tools.iter_mut().find(|t| t.name == spec.name) {
            *existing = spec;
        } else {
            tools.push(spec);
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut tools = self.tools.write();
        let before = tools.len();
        tools.retain(|t| t.name != name);
        tools.len() != before
    }

    pub fn get(&self, name: &str) -> Option<ToolSpec> {
        self.tools.read().iter().find(|t| t.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Enabled tools this agent may invoke, in registration order.
    pub fn list_for(&self, agent_id: &str, role: &AgentRole) -> Vec<ToolSpec> {
        self.tools
            .read()
            .iter()
            .filter(|t| t.enabled && t.permissions.allows(agent_id, role))
            .cloned()
            .collect()
    }

    pub fn has_permission(&self, name: &str, agent_id: &str, role: &AgentRole) -> bool {
        self.get(name)
            .is_some_and(|t| t.permissions.allows(agent_id, role))
    }

    /// Non-mutating rate-limit inspection.
    pub fn check_rate_limit(&self, name: &str, agent_id: &str) -> Result<(), LimitExceeded> {
        match self.get(name).and_then(|t| t.rate_limit) {
            Some(limit) => self.limits.check(name, agent_id, &limit),
            None => Ok(()),
        }
    }

    /// Admit an invocation: permission check, rate-limit check, take a
    /// concurrent slot. The returned guard must be handed to
    /// [`Self::complete`].
    pub fn begin_invocation(
        &self,
        name: &str,
        agent_id: &str,
        role: &AgentRole,
    ) -> Result<InvocationGuard, InvocationDenied> {
        let Some(tool) = self.get(name) else {
            return Err(InvocationDenied::UnknownTool);
        };
        if !tool.enabled {
            return Err(InvocationDenied::Disabled);
        }
        if !tool.permissions.allows(agent_id, role) {
            return Err(InvocationDenied::Permission);
        }
        if let Some(limit) = &tool.rate_limit {
            self.limits
                .admit(name, agent_id, limit)
                .map_err(InvocationDenied::RateLimited)?;
        }
        Ok(InvocationGuard {
            tool: name.to_string(),
            agent_id: agent_id.to_string(),
            started: Instant::now(),
        })
    }

    /// Record the outcome and release the concurrent slot.
    pub fn complete(&self, guard: InvocationGuard, success: bool) {
        let duration_ms = guard.started.elapsed().as_millis() as u64;
        self.limits.release(&guard.tool, &guard.agent_id);

        let mut usage = self.usage.lock();
        let entry = usage
            .entry((guard.tool.clone(), guard.agent_id.clone()))
            .or_default();
        entry.invocations += 1;
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.total_duration_ms += duration_ms;
        entry.last_invoked_at = Some(Utc::now());
    }

    /// Aggregate usage across agents for one tool.
    pub fn usage_for(&self, name: &str) -> ToolUsage {
        let usage = self.usage.lock();
        let mut total = ToolUsage::default();
        for ((tool, _), entry) in usage.iter() {
            if tool == name {
                total.invocations += entry.invocations;
                total.successes += entry.successes;
                total.failures += entry.failures;
                total.total_duration_ms += entry.total_duration_ms;
                total.last_invoked_at = match (total.last_invoked_at, entry.last_invoked_at) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
        }
        total
    }

    pub fn usage_for_agent(&self, name: &str, agent_id: &str) -> ToolUsage {
        self.usage
            .lock()
            .get(&(name.to_string(), agent_id.to_string()))
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec::new(name)
    }

    #[test]
    fn open_tool_admits_anyone() {
        let registry = ToolRegistry::new();
        registry.register(spec("echo"));
        assert!(registry.has_permission("echo", "alice", &AgentRole::Participant));
        let guard = registry
            .begin_invocation("echo", "alice", &AgentRole::Participant)
            .unwrap();
        registry.complete(guard, true);
        assert_eq!(registry.usage_for("echo").successes, 1);
    }

    #[test]
    fn deny_list_wins_over_allow_list() {
        let registry = ToolRegistry::new();
        let mut tool = spec("search");
        tool.permissions.allowed_agents.insert("alice".into());
        tool.permissions.denied_agents.insert("alice".into());
        registry.register(tool);
        assert!(!registry.has_permission("search", "alice", &AgentRole::Admin));
    }

    #[test]
    fn allow_list_overrides_tier() {
        let registry = ToolRegistry::new();
        let mut tool = spec("deploy");
        tool.permissions.allowed_agents.insert("bob".into());
        tool.permissions.tier = Some(ToolTier::Admin);
        registry.register(tool);

        // bob passes despite not being admin; others fail.
        assert!(registry.has_permission("deploy", "bob", &AgentRole::Participant));
        assert!(!registry.has_permission("deploy", "eve", &AgentRole::Admin));
    }

    #[test]
    fn role_list_can_veto_before_tier() {
        let registry = ToolRegistry::new();
        let mut tool = spec("review");
        tool.permissions.allowed_roles.insert("critic".into());
        registry.register(tool);

        assert!(registry.has_permission("review", "x", &AgentRole::Critic));
        assert!(!registry.has_permission("review", "x", &AgentRole::Architect));
    }

    #[test]
    fn tier_applies_when_nothing_else_configured() {
        let registry = ToolRegistry::new();
        let mut tool = spec("metrics");
        tool.permissions.tier = Some(ToolTier::Expert);
        registry.register(tool);

        assert!(registry.has_permission("metrics", "x", &AgentRole::Architect));
        assert!(!registry.has_permission("metrics", "x", &AgentRole::Pragmatist));
    }

    #[test]
    fn disabled_tool_cannot_be_invoked() {
        let registry = ToolRegistry::new();
        let mut tool = spec("old");
        tool.enabled = false;
        registry.register(tool);
        assert!(matches!(
            registry.begin_invocation("old", "a", &AgentRole::Admin),
            Err(InvocationDenied::Disabled)
        ));
    }

    #[test]
    fn denied_invocation_records_no_success() {
        let registry = ToolRegistry::new();
        let mut tool = spec("locked");
        tool.permissions.tier = Some(ToolTier::Admin);
        registry.register(tool);

        assert!(matches!(
            registry.begin_invocation("locked", "a", &AgentRole::Participant),
            Err(InvocationDenied::Permission)
        ));
        assert_eq!(registry.usage_for("locked").invocations, 0);
        assert_eq!(registry.usage_for("locked").successes, 0);
    }

    #[test]
    fn rate_limited_after_ceiling() {
        let registry = ToolRegistry::new();
        let mut tool = spec("burst");
        tool.rate_limit = Some(RateLimit {
            per_hour: Some(2),
            ..Default::default()
        });
        registry.register(tool);

        for _ in 0..2 {
            let guard = registry
                .begin_invocation("burst", "a", &AgentRole::Participant)
                .unwrap();
            registry.complete(guard, true);
        }
        assert!(matches!(
            registry.begin_invocation("burst", "a", &AgentRole::Participant),
            Err(InvocationDenied::RateLimited(_))
        ));
    }

    #[test]
    fn concurrent_slot_released_on_complete() {
        let registry = ToolRegistry::new();
        let mut tool = spec("solo");
        tool.rate_limit = Some(RateLimit {
            max_concurrent: Some(1),
            ..Default::default()
        });
        registry.register(tool);

        let guard = registry
            .begin_invocation("solo", "a", &AgentRole::Participant)
            .unwrap();
        assert!(matches!(
            registry.begin_invocation("solo", "a", &AgentRole::Participant),
            Err(InvocationDenied::RateLimited(_))
        ));
        registry.complete(guard, false);
        let guard = registry
            .begin_invocation("solo", "a", &AgentRole::Participant)
            .unwrap();
        registry.complete(guard, true);

        let usage = registry.usage_for_agent("solo", "a");
        assert_eq!(usage.invocations, 2);
        assert_eq!(usage.successes, 1);
        assert_eq!(usage.failures, 1);
    }

    #[test]
    fn listing_filters_by_permission_and_keeps_order() {
        let registry = ToolRegistry::new();
        registry.register(spec("alpha"));
        let mut restricted = spec("beta");
        restricted.permissions.tier = Some(ToolTier::Moderator);
        registry.register(restricted);
        registry.register(spec("gamma"));

        let names: Vec<String> = registry
            .list_for("x", &AgentRole::Participant)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["alpha", "gamma"]);

        let names: Vec<String> = registry
            .list_for("x", &AgentRole::Moderator)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn reregistering_replaces_in_place() {
        let registry = ToolRegistry::new();
        registry.register(spec("echo"));
        let mut updated = spec("echo");
        updated.description = "v2".into();
        registry.register(updated);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().description, "v2");
    }
}
