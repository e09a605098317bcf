//! MCP Client — JSON-RPC over stdio transport to a single MCP server.
//!
//! This module handles:
//! - Spawning the server as a child process with piped stdio
//! - The initialize / initialized handshake, once per process
//! - Newline-delimited JSON-RPC 2.0 request/response correlation
//! - Rendering server log notifications and captured stderr
//! - Ephemeral or persistent process lifecycle, with kill-on-timeout
//!
//! Building method names and params (`tools/call`, `resources/read`, ...)
//! is left to callers of [`Transport::execute`].

pub mod config;
pub mod correlator;
pub mod diagnostics;
pub mod errors;
pub mod handshake;
pub mod lifecycle;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use config::{SessionMode, StaleResponsePolicy, TransportConfig};
pub use diagnostics::DiagnosticSink;
pub use errors::McpError;
pub use transport::{StdioTransport, Transport};
