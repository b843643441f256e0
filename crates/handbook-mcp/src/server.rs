//! Newline-delimited JSON-RPC over any async reader/writer pair; stdio in
//! production.

use handbook_core::error::{Error, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, ToolCallParams, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::tools::{definitions, HandbookTools};

pub const SERVER_NAME: &str = "handbook-mcp";

pub struct McpServer {
    tools: HandbookTools,
}

impl McpServer {
    pub fn new(tools: HandbookTools) -> Self { Self { tools } }

    pub fn tools(&self) -> &HandbookTools { &self.tools }

    /// Answer one line of input. Notifications and blank lines produce no
    /// output.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() { return None; }
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return Some(JsonRpcResponse::failure(Value::Null, PARSE_ERROR, format!("parse error: {e}"))),
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(JsonRpcResponse::failure(id, INVALID_REQUEST, format!("invalid request: {e}"))),
        }
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(id, INVALID_REQUEST, "jsonrpc must be \"2.0\""));
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": definitions() })),
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                match serde_json::from_value::<ToolCallParams>(params) {
                    Ok(call) => {
                        debug!(tool = %call.name, "tools/call");
                        let result = self.tools.call(&call.name, call.arguments).await;
                        match serde_json::to_value(result) {
                            Ok(v) => JsonRpcResponse::success(id, v),
                            Err(e) => JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
                        }
                    }
                    Err(e) => JsonRpcResponse::failure(id, INVALID_PARAMS, format!("invalid tools/call params: {e}")),
                }
            }
            other => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("method not found: {other}")),
        };
        Some(response)
    }

    /// Serve until the reader reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let Some(response) = self.handle_line(&line).await else { continue };
            let mut out = serde_json::to_string(&response).map_err(|e| Error::Operation(e.to_string()))?;
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
            if let Some(err) = &response.error {
                warn!(code = err.code, message = %err.message, "request failed");
            }
        }
        Ok(())
    }

    pub async fn serve_stdio(&self) -> Result<()> {
        info!(server = SERVER_NAME, "serving MCP over stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }
}
