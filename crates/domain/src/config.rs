use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent::ToolTier;
use crate::mode::RoomMode;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub federation: FederationConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Tools registered into every room at creation (key order preserved).
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_4800")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4800,
            host: "127.0.0.1".into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Federation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Distinguishes this node on the bus. A random id is minted at
    /// startup when unset.
    #[serde(default)]
    pub server_id: Option<String>,
    /// Relay address (`host:port`). Absent ⇒ single-node operation.
    #[serde(default)]
    pub bus_url: Option<String>,
    /// Logical bus channel shared by one deployment.
    #[serde(default = "d_channel")]
    pub channel: String,
    /// Capacity of the per-room seen-id set used for bus deduplication.
    #[serde(default = "d_seen_limit")]
    pub seen_id_limit: usize,
    /// Outbound publish queue depth before enqueue-and-drop.
    #[serde(default = "d_publish_queue")]
    pub publish_queue_limit: usize,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            server_id: None,
            bus_url: None,
            channel: d_channel(),
            seen_id_limit: 10_000,
            publish_queue_limit: 1024,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rooms
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    /// Mode applied to rooms created without an explicit mode.
    #[serde(default)]
    pub default_mode: RoomMode,
    /// When set, a JOIN without `roomId` lazily creates a room named
    /// `default` with this topic. Unset ⇒ such JOINs are rejected.
    #[serde(default)]
    pub default_topic: Option<String>,
    /// Shut a room down when its last member leaves.
    #[serde(default)]
    pub reap_on_empty: bool,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            default_mode: RoomMode::Deep,
            default_topic: None,
            reap_on_empty: false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Max queued outbound frames per connection; overflow closes it.
    #[serde(default = "d_send_buffer")]
    pub send_buffer_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            send_buffer_limit: 256,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Directory for the JSONL repository. Unset ⇒ in-memory only.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Explicit allow list; when non-empty only these agents qualify.
    #[serde(default)]
    pub allowed_agents: Vec<String>,
    /// Deny list; always wins.
    #[serde(default)]
    pub denied_agents: Vec<String>,
    /// Role allow list (free-form role strings).
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub tier: Option<ToolTier>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub per_hour: Option<u32>,
    #[serde(default)]
    pub per_day: Option<u32>,
    #[serde(default)]
    pub max_concurrent: Option<u32>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_4800() -> u16 {
    4800
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_channel() -> String {
    "agora".into()
}
fn d_seen_limit() -> usize {
    10_000
}
fn d_publish_queue() -> usize {
    1024
}
fn d_send_buffer() -> usize {
    256
}
fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.federation.seen_id_limit == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "federation.seen_id_limit".into(),
                message: "seen-id capacity must be greater than 0".into(),
            });
        }

        if self.federation.channel.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "federation.channel".into(),
                message: "channel must not be empty".into(),
            });
        }

        if let Some(url) = &self.federation.bus_url {
            if url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "federation.bus_url".into(),
                    message: "bus_url must not be empty when set".into(),
                });
            }
        }

        if self.limits.send_buffer_limit == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "limits.send_buffer_limit".into(),
                message: "send buffer must hold at least one frame".into(),
            });
        }

        // Track seen tool names for duplicate detection.
        let mut seen_names: HashSet<&str> = HashSet::new();

        for (i, tool) in self.tools.iter().enumerate() {
            if tool.name.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("tools[{i}].name"),
                    message: "tool name must not be empty".into(),
                });
            }
            if !tool.name.is_empty() && !seen_names.insert(&tool.name) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("tools[{i}].name"),
                    message: format!(
                        "duplicate tool \"{}\" — later entry will shadow earlier one",
                        tool.name
                    ),
                });
            }
            if let Some(rl) = &tool.rate_limit {
                if rl.per_hour == Some(0) || rl.per_day == Some(0) || rl.max_concurrent == Some(0) {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Warning,
                        field: format!("tools[{i}].rate_limit"),
                        message: "a zero ceiling disables the tool entirely".into(),
                    });
                }
            }
        }

        errors
    }
}
