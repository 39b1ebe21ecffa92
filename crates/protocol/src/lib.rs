//! Wire protocol: client commands, server events, and the federation
//! bus envelope.
//!
//! Frames are self-describing JSON records with a mandatory `type`
//! discriminant and a `timestamp` in milliseconds. The codec rejects
//! unknown discriminants, missing required fields, and out-of-range
//! values; unknown *extra* fields are tolerated so newer clients can
//! talk to older servers.

mod bus;
mod codec;
mod command;
mod event;

pub use bus::BusEnvelope;
pub use codec::{decode_command, decode_event, encode_event};
pub use command::ClientCommand;
pub use event::{RoomInfo, ServerEvent, ToolInfo};

/// Current wall-clock time as wire milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
