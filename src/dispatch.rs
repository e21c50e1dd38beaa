#![deny(warnings)]

// JSON-RPC 2.0 routing: decodes one message, runs it against the server,
// and builds the response envelope. Shared by the stdio and WebSocket loops.

use crate::error::{FileIoMcpError, McpError};
use crate::server::McpServer;
use serde_json::{Value, json};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const SERVER_ERROR: i32 = -32000;

/// Protocol version assumed when `initialize` omits one.
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn not_initialized() -> Self {
        Self::new(SERVER_ERROR, "Server not initialized. Call 'initialize' first.")
    }
}

impl From<FileIoMcpError> for RpcError {
    fn from(error: FileIoMcpError) -> Self {
        let code = match error {
            FileIoMcpError::Mcp(
                McpError::InvalidToolParameters(_)
                | McpError::ToolNotFound(_)
                | McpError::InvalidProtocolVersion(_),
            ) => INVALID_PARAMS,
            _ => SERVER_ERROR,
        };
        Self::new(code, error.to_string())
    }
}

/// A decoded message. `id` is `None` for notifications.
struct Request<'a> {
    id: Option<Value>,
    method: Option<&'a str>,
    params: &'a Value,
}

impl<'a> Request<'a> {
    fn parse(message: &'a Value) -> Self {
        Self {
            id: message.get("id").cloned(),
            method: message.get("method").and_then(Value::as_str),
            params: message.get("params").unwrap_or(&Value::Null),
        }
    }
}

/// Handle one decoded JSON-RPC message. Returns the response to send, or
/// `None` for notifications, which are never answered (not even with an
/// error).
pub async fn handle_message(server: &McpServer, message: &Value) -> Option<Value> {
    let request = Request::parse(message);
    let outcome = route(server, message, &request).await;

    let Some(id) = request.id else {
        if let Err(e) = outcome {
            tracing::debug!(method = request.method, error = %e.message, "notification failed");
        }
        return None;
    };

    Some(match outcome {
        Ok(result) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }),
        Err(e) => error_response(Some(id), &e),
    })
}

/// Response for bytes that could not be decoded into a message at all.
pub fn parse_error(detail: &str) -> Value {
    error_response(None, &RpcError::new(PARSE_ERROR, format!("Parse error: {}", detail)))
}

fn error_response(id: Option<Value>, error: &RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message,
        },
    })
}

async fn route(
    server: &McpServer,
    message: &Value,
    request: &Request<'_>,
) -> Result<Value, RpcError> {
    if let Some(version) = message.get("jsonrpc").and_then(Value::as_str)
        && version != "2.0"
    {
        return Err(RpcError::new(
            INVALID_REQUEST,
            format!("Invalid JSON-RPC version: {}", version),
        ));
    }

    let Some(method) = request.method else {
        return Err(RpcError::new(INVALID_REQUEST, "Invalid request: missing method"));
    };
    let params = request.params;
    let ready = server.is_initialized().await;

    match method {
        "initialize" => {
            let version = params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROTOCOL_VERSION);
            let capabilities = params.get("capabilities").unwrap_or(&Value::Null);
            server
                .handle_initialize(version, capabilities)
                .await
                .map_err(RpcError::from)
        }
        "initialized" | "notifications/initialized" => {
            server.handle_initialized().await?;
            Ok(Value::Null)
        }
        "ping" => Ok(json!({})),
        "tools/list" | "tools/call" | "shutdown" if !ready => Err(RpcError::not_initialized()),
        "tools/list" => Ok(json!({ "tools": server.list_tools() })),
        "tools/call" => {
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return Err(RpcError::new(INVALID_PARAMS, "Invalid params: Missing tool name"));
            };
            let arguments = params.get("arguments").unwrap_or(&Value::Null);
            server
                .handle_tool_call(name, arguments)
                .await
                .map_err(RpcError::from)
        }
        "shutdown" => {
            server.handle_shutdown().await?;
            Ok(Value::Null)
        }
        other => Err(RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", other))),
    }
}
