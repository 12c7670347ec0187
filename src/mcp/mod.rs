//! MCP protocol surface: the transport-agnostic envelope dispatcher plus
//! the three concrete transports (single-shot HTTP, streaming HTTP
//! sessions, stdio).

pub mod server;
pub mod sse;
pub mod stdio;

pub use server::{MCP_PROTOCOL_VERSION, handle_envelope};
