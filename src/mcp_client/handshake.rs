//! MCP initialization handshake.
//!
//! `initialize` request, wait for its response, then the fire-and-forget
//! `notifications/initialized`. Runs once per server process.

use tokio::io::{AsyncBufRead, AsyncWrite};

use super::config::StaleResponsePolicy;
use super::correlator::{read_response, send_message, IdAllocator};
use super::diagnostics::DiagnosticSink;
use super::errors::McpError;
use super::types::{
    ClientInfo, InitializeParams, JsonRpcRequest, METHOD_INITIALIZE, METHOD_INITIALIZED,
};

/// Perform the handshake over the given streams.
///
/// Returns the server's `initialize` result. Any failure is wrapped in
/// [`McpError::InitFailed`]; nothing is retried.
pub async fn initialize<R, W>(
    reader: &mut R,
    writer: &mut W,
    ids: &mut IdAllocator,
    client_info: &ClientInfo,
    stale: StaleResponsePolicy,
    diag: &DiagnosticSink,
) -> Result<serde_json::Value, McpError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let wrap = |source: McpError| McpError::InitFailed {
        source: Box::new(source),
    };

    let params = serde_json::to_value(InitializeParams::new(client_info.clone())).map_err(|e| {
        wrap(McpError::Serialization {
            method: METHOD_INITIALIZE.into(),
            reason: e.to_string(),
        })
    })?;

    let id = ids.allocate();
    let request = JsonRpcRequest::new(id, METHOD_INITIALIZE, Some(params));
    send_message(writer, &request, diag).await.map_err(wrap)?;

    let result = read_response(reader, id, stale, diag).await.map_err(wrap)?;

    let notification = JsonRpcRequest::notification(METHOD_INITIALIZED, None);
    send_message(writer, &notification, diag)
        .await
        .map_err(wrap)?;

    tracing::info!(
        id,
        server = ?result.get("serverInfo"),
        protocol = ?result.get("protocolVersion"),
        "MCP handshake complete"
    );

    Ok(result)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_client::diagnostics::CaptureBuffer;

    fn diag() -> DiagnosticSink {
        DiagnosticSink::new(CaptureBuffer::new())
    }

    #[tokio::test]
    async fn test_handshake_sends_initialize_then_initialized() {
        let mut reader = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"protocolVersion\":\"2024-11-05\",",
            "\"serverInfo\":{\"name\":\"echo\",\"version\":\"1\"}}}\n"
        )
        .as_bytes();
        let mut writer: Vec<u8> = Vec::new();
        let mut ids = IdAllocator::new();

        let result = initialize(
            &mut reader,
            &mut writer,
            &mut ids,
            &ClientInfo::default(),
            StaleResponsePolicy::Skip,
            &diag(),
        )
        .await
        .unwrap();

        assert_eq!(result["serverInfo"]["name"], "echo");
        assert_eq!(ids.peek(), 2);

        let sent = String::from_utf8(writer).unwrap();
        let lines: Vec<serde_json::Value> = sent
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["method"], "initialize");
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["params"]["protocolVersion"], "2024-11-05");
        assert_eq!(lines[0]["params"]["capabilities"], serde_json::json!({}));
        assert_eq!(lines[0]["params"]["clientInfo"]["name"], "mcp-stdio");
        assert_eq!(lines[1]["method"], "notifications/initialized");
        assert!(lines[1].get("id").is_none());
    }

    #[tokio::test]
    async fn test_handshake_error_is_not_followed_by_initialized() {
        let mut reader =
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32602,\"message\":\"unsupported protocol\"}}\n"
                .as_bytes();
        let mut writer: Vec<u8> = Vec::new();
        let mut ids = IdAllocator::new();

        let err = initialize(
            &mut reader,
            &mut writer,
            &mut ids,
            &ClientInfo::default(),
            StaleResponsePolicy::Skip,
            &diag(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, McpError::InitFailed { .. }));
        assert_eq!(err.rpc_code(), Some(-32602));
        let sent = String::from_utf8(writer).unwrap();
        assert_eq!(sent.lines().count(), 1);
        assert!(!sent.contains("notifications/initialized"));
    }

    #[tokio::test]
    async fn test_handshake_eof_fails() {
        let mut reader: &[u8] = b"";
        let mut writer: Vec<u8> = Vec::new();
        let mut ids = IdAllocator::new();

        let err = initialize(
            &mut reader,
            &mut writer,
            &mut ids,
            &ClientInfo::default(),
            StaleResponsePolicy::Skip,
            &diag(),
        )
        .await
        .unwrap_err();

        match err {
            McpError::InitFailed { source } => {
                assert!(matches!(*source, McpError::TransportRead { .. }))
            }
            other => panic!("expected InitFailed, got {other:?}"),
        }
    }
}
