//! Agora server: session layer, room engine, and federation glue.
//!
//! The binary lives in `main.rs`; everything here is also reachable from
//! the integration tests, which drive rooms directly and over a real
//! WebSocket.

pub mod cli;
pub mod federation;
pub mod rooms;
pub mod state;
pub mod ws;

pub use state::AppState;
