//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur while driving an MCP server over stdio.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process could not be started (empty command, pipe setup,
    /// or OS refusal).
    #[error("failed to spawn server {command:?}: {reason}")]
    SpawnFailed {
        command: Vec<String>,
        reason: String,
    },

    /// An outgoing message could not be encoded as JSON.
    #[error("failed to serialize {method}: {reason}")]
    Serialization {
        method: String,
        reason: String,
    },

    /// Reading a line from the server's stdout failed or hit end-of-stream.
    #[error("error reading from stdout: {reason}")]
    TransportRead {
        reason: String,
    },

    /// Writing or flushing the server's stdin failed.
    #[error("error writing to stdin: {reason}")]
    TransportWrite {
        reason: String,
    },

    /// A line from the server was not valid JSON or not a JSON-RPC response.
    #[error("malformed message: {reason}, response: {line}")]
    MalformedMessage {
        line: String,
        reason: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The initialize handshake failed.
    #[error("initialization failed: {source}")]
    InitFailed {
        #[source]
        source: Box<McpError>,
    },

    /// The server exited with a failing status and wrote to stderr while
    /// shutting down. The response obtained before shutdown is kept.
    #[error("command error: {status}{}", format_stderr_suffix(stderr))]
    CommandExit {
        status: String,
        stderr: String,
        result: Option<serde_json::Value>,
    },

    /// Configuration error (bad config file, missing command).
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl McpError {
    /// Whether the session's stdio streams can no longer be trusted after
    /// this error. RPC errors and shutdown reports leave the stream in sync.
    pub fn is_transport_failure(&self) -> bool {
        match self {
            McpError::Rpc { .. } | McpError::CommandExit { .. } | McpError::ConfigError { .. } => {
                false
            }
            McpError::InitFailed { .. }
            | McpError::SpawnFailed { .. }
            | McpError::Serialization { .. }
            | McpError::TransportRead { .. }
            | McpError::TransportWrite { .. }
            | McpError::MalformedMessage { .. } => true,
        }
    }

    /// The JSON-RPC error code, if the server reported one (also through a
    /// failed handshake).
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            McpError::Rpc { code, .. } => Some(*code),
            McpError::InitFailed { source } => source.rpc_code(),
            _ => None,
        }
    }
}

/// Format a stderr suffix for error messages (empty string if no stderr).
fn format_stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" | stderr: {trimmed}")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display_is_verbatim() {
        let err = McpError::Rpc {
            code: -32601,
            message: "Method not found".into(),
            data: None,
        };
        let text = err.to_string();
        assert!(text.contains("-32601"));
        assert!(text.contains("Method not found"));
        assert!(!err.is_transport_failure());
    }

    #[test]
    fn test_init_failed_wraps_source() {
        let err = McpError::InitFailed {
            source: Box::new(McpError::Rpc {
                code: -32602,
                message: "bad protocol version".into(),
                data: None,
            }),
        };
        assert_eq!(err.rpc_code(), Some(-32602));
        assert!(err.to_string().contains("bad protocol version"));
        assert!(err.is_transport_failure());
    }

    #[test]
    fn test_malformed_message_includes_line() {
        let err = McpError::MalformedMessage {
            line: "not json".into(),
            reason: "expected value".into(),
        };
        assert!(err.to_string().contains("not json"));
    }

    #[test]
    fn test_command_exit_stderr_suffix() {
        let err = McpError::CommandExit {
            status: "exit status: 1".into(),
            stderr: "boom\n".into(),
            result: None,
        };
        assert_eq!(err.to_string(), "command error: exit status: 1 | stderr: boom");
    }
}
