//! Shared types for the MCP client.
//!
//! JSON-RPC 2.0 envelopes exchanged with the server process and the MCP
//! payloads the transport itself needs (handshake, log notifications).

use serde::{Deserialize, Serialize};

// ─── Protocol Constants ──────────────────────────────────────────────────────

/// JSON-RPC protocol version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method name of the handshake request.
pub const METHOD_INITIALIZE: &str = "initialize";

/// Method name of the notification that completes the handshake.
pub const METHOD_INITIALIZED: &str = "notifications/initialized";

/// Method name of server log notifications.
pub const METHOD_LOG_MESSAGE: &str = "notifications/message";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
///
/// A request without an `id` is a notification and the peer must not reply.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request that expects a response.
    pub fn new(id: i64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            id: Some(id),
            params,
        }
    }

    /// Create a notification (no `id`, no response).
    pub fn notification(method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            id: None,
            params,
        }
    }
}

/// JSON-RPC 2.0 response message (success or error).
///
/// `id` may be null when the server reports a protocol error it could not
/// attribute to a request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// Name and version this client reports in `clientInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Params of the `initialize` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub client_info: ClientInfo,
    pub protocol_version: String,
    pub capabilities: serde_json::Map<String, serde_json::Value>,
}

impl InitializeParams {
    pub fn new(client_info: ClientInfo) -> Self {
        Self {
            client_info,
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::Map::new(),
        }
    }
}

/// Params of a `notifications/message` log event.
///
/// Servers are loose about these fields, so both default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogMessageParams {
    #[serde(default)]
    pub level: String,
    #[serde(default, deserialize_with = "deserialize_log_data")]
    pub data: String,
}

/// `data` is specified as a string; anything else is rendered as JSON text.
fn deserialize_log_data<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_field_order() {
        let req = JsonRpcRequest::new(1, "ping", None);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","method":"ping","id":1}"#);
    }

    #[test]
    fn test_request_with_params() {
        let params = serde_json::json!({"name": "read_file", "arguments": {"path": "/tmp"}});
        let req = JsonRpcRequest::new(42, "tools/call", Some(params));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"id\":42"));
        assert!(json.contains("tools/call"));
        assert!(json.contains("/tmp"));
    }

    #[test]
    fn test_notification_omits_id() {
        let note = JsonRpcRequest::notification(METHOD_INITIALIZED, None);
        assert_eq!(note.id, None);
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#
        );
    }

    #[test]
    fn test_initialize_params_shape() {
        let params = InitializeParams::new(ClientInfo {
            name: "mcp-stdio".into(),
            version: "0.1.0".into(),
        });
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["clientInfo"]["name"], "mcp-stdio");
        assert_eq!(value["clientInfo"]["version"], "0.1.0");
        assert_eq!(value["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["capabilities"], serde_json::json!({}));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"jsonrpc": "2.0", "id": 1, "result": {"tools": []}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, Some(1));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_error_response_with_null_id() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32601, "message": "Method not found"}
        }"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, None);
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found");
    }

    #[test]
    fn test_error_object_without_message() {
        let json = r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "");
        assert!(err.data.is_none());
    }

    #[test]
    fn test_log_params_non_string_data() {
        let params: LogMessageParams =
            serde_json::from_value(serde_json::json!({"level": "info", "data": {"n": 1}}))
                .unwrap();
        assert_eq!(params.level, "info");
        assert_eq!(params.data, r#"{"n":1}"#);
    }

    #[test]
    fn test_default_client_info() {
        let info = ClientInfo::default();
        assert_eq!(info.name, "mcp-stdio");
        assert!(!info.version.is_empty());
    }
}
