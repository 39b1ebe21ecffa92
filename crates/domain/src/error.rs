/// Shared error type used across all agora crates.
///
/// Variants follow the failure taxonomy the server propagates over the wire:
/// protocol and state errors reply `ERROR` to the offending connection,
/// addressing errors answer the caller only, persistence and federation
/// errors are logged and (for chat fan-out) swallowed.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad framing, unknown discriminant, missing field, out-of-range value.
    #[error("protocol: {0}")]
    Protocol(String),

    /// Unknown room, proposal, or agent.
    #[error("unknown {kind}: {id}")]
    Addressing { kind: &'static str, id: String },

    /// Operation illegal in the current state (duplicate agent id,
    /// vote on a resolved proposal).
    #[error("{0}")]
    State(String),

    /// Rate-limited tool, send buffer overflow.
    #[error("resource: {0}")]
    Resource(String),

    #[error("persistence: {0}")]
    Persistence(String),

    #[error("federation: {0}")]
    Federation(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn addressing(kind: &'static str, id: impl Into<String>) -> Self {
        Self::Addressing {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
