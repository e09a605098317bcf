//! Request/response correlation over newline-delimited JSON.
//!
//! Writes one JSON object per line to the server's stdin and reads stdout
//! line by line until the response to the request just sent shows up.
//! Server notifications arriving in between are rendered to the diagnostic
//! stream and skipped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::config::StaleResponsePolicy;
use super::diagnostics::DiagnosticSink;
use super::errors::McpError;
use super::types::{JsonRpcRequest, JsonRpcResponse, LogMessageParams, METHOD_LOG_MESSAGE};

// ─── Id Allocation ───────────────────────────────────────────────────────────

/// Monotonic request id source, owned by one transport.
///
/// Ids start at 1 and are never reset, even when the server process is
/// replaced.
#[derive(Debug)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next `allocate` call will return.
    pub fn peek(&self) -> i64 {
        self.next
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Incoming Lines ──────────────────────────────────────────────────────────

/// One line read from the server, classified.
#[derive(Debug)]
pub enum Incoming {
    /// A `notifications/message` log event.
    LogMessage(LogMessageParams),
    /// Any other server-initiated notification.
    Notification { method: String },
    /// A JSON-RPC response (matching or not).
    Response(JsonRpcResponse),
}

/// Classify a single line of server output.
///
/// A line with a `method` and no (or a null) `id` is a notification.
/// Everything else must be a well-formed response.
pub fn classify_line(line: &str) -> Result<Incoming, McpError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| McpError::MalformedMessage {
            line: line.to_string(),
            reason: format!("error unmarshaling message: {e}"),
        })?;

    if let Some(obj) = value.as_object() {
        let has_id = obj.get("id").is_some_and(|id| !id.is_null());
        if let (Some(method), false) = (obj.get("method"), has_id) {
            let method = method.as_str().unwrap_or_default().to_string();
            if method == METHOD_LOG_MESSAGE {
                if let Some(params) = obj
                    .get("params")
                    .and_then(|p| serde_json::from_value::<LogMessageParams>(p.clone()).ok())
                {
                    return Ok(Incoming::LogMessage(params));
                }
            }
            return Ok(Incoming::Notification { method });
        }
    }

    let response: JsonRpcResponse =
        serde_json::from_value(value).map_err(|e| McpError::MalformedMessage {
            line: line.to_string(),
            reason: format!("error unmarshaling response: {e}"),
        })?;
    Ok(Incoming::Response(response))
}

// ─── Sending ─────────────────────────────────────────────────────────────────

/// Serialize `message` as one line and write it fully, then flush.
pub async fn send_message<W>(
    writer: &mut W,
    message: &JsonRpcRequest,
    diag: &DiagnosticSink,
) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
{
    let mut json = serde_json::to_string(message).map_err(|e| McpError::Serialization {
        method: message.method.clone(),
        reason: format!("error marshaling request: {e}"),
    })?;
    json.push('\n');

    diag.debug(&format!("Preparing to send request: {}", json.trim_end()));

    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| McpError::TransportWrite {
            reason: format!("error writing bytes to stdin: {e}"),
        })?;

    diag.debug(&format!("Wrote {} bytes", json.len()));

    writer.flush().await.map_err(|e| McpError::TransportWrite {
        reason: format!("error flushing bytes to stdin: {e}"),
    })?;

    diag.debug("Successfully flushed bytes");
    tracing::debug!(
        method = %message.method,
        id = ?message.id,
        bytes = json.len(),
        "sent message"
    );

    Ok(())
}

// ─── Receiving ───────────────────────────────────────────────────────────────

/// Read lines until the response to `expected_id` arrives.
///
/// Returns the response's `result` (`Null` if absent). An error response is
/// returned as [`McpError::Rpc`] whatever its id, since servers do not always
/// echo ids on protocol errors.
pub async fn read_response<R>(
    reader: &mut R,
    expected_id: i64,
    stale: StaleResponsePolicy,
    diag: &DiagnosticSink,
) -> Result<serde_json::Value, McpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| McpError::TransportRead {
                reason: e.to_string(),
            })?;

        if bytes_read == 0 {
            return Err(McpError::TransportRead {
                reason: "server stdout closed (process may have exited)".into(),
            });
        }
        if buf.last() != Some(&b'\n') {
            return Err(McpError::TransportRead {
                reason: format!(
                    "unexpected end of stream after partial line: {}",
                    String::from_utf8_lossy(&buf)
                ),
            });
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        diag.debug(&format!("Read from stdout: {line}"));

        if line.is_empty() {
            continue;
        }

        match classify_line(line)? {
            Incoming::LogMessage(params) => {
                tracing::debug!(level = %params.level, "server log notification");
                diag.log_message(&params);
            }
            Incoming::Notification { method } => {
                tracing::debug!(%method, "server notification");
                diag.notification(line);
            }
            Incoming::Response(response) => {
                if let Some(err) = response.error {
                    tracing::debug!(
                        code = err.code,
                        id = ?response.id,
                        expected_id,
                        "server returned error response"
                    );
                    return Err(McpError::Rpc {
                        code: err.code,
                        message: err.message,
                        data: err.data,
                    });
                }

                if response.id == Some(expected_id) {
                    diag.debug(&format!(
                        "Successfully parsed response with matching ID: {expected_id}"
                    ));
                    return Ok(response.result.unwrap_or(serde_json::Value::Null));
                }

                match stale {
                    StaleResponsePolicy::Skip => {
                        tracing::warn!(
                            id = ?response.id,
                            expected_id,
                            "discarding response for another request"
                        );
                        diag.debug(&format!(
                            "Received response for request ID {:?}, expecting {expected_id}. Continuing to read.",
                            response.id
                        ));
                    }
                    StaleResponsePolicy::Reject => {
                        return Err(McpError::MalformedMessage {
                            line: line.to_string(),
                            reason: format!(
                                "response id {:?} does not match request id {expected_id}",
                                response.id
                            ),
                        });
                    }
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
