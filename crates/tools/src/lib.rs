//! Per-room tool registry: registration, permission checks, rate
//! limiting, and usage accounting.
//!
//! The registry never executes anything — it decides whether an agent
//! may invoke a tool right now, tracks in-flight concurrency, and
//! accounts for completed invocations.

mod limits;
mod registry;

pub use limits::{LimitExceeded, LimitKind, RateLimit};
pub use registry::{
    InvocationDenied, InvocationGuard, ToolPermissions, ToolRegistry, ToolSpec, ToolUsage,
};
