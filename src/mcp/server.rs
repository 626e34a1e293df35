//! Stdio MCP server — line-delimited JSON-RPC 2.0 over stdin/stdout.
//!
//! One request per line, one response per line. Notifications (no `id`)
//! are consumed without a reply. Logging goes to stderr so stdout stays
//! protocol-clean.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::resources::{list_resources, read_resource};
use crate::service::Service;

use super::protocol::{
    response_error, response_ok, JsonRpcRequest, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use super::tools::{call_tool, list_tools};

pub struct McpServer {
    service: Arc<Service>,
    config: Config,
}

impl McpServer {
    pub fn new(service: Arc<Service>, config: Config) -> Self {
        Self { service, config }
    }

    /// Serve requests from stdin until EOF.
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        info!("MCP server listening on stdio");
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let text = serde_json::to_string(&response)?;
                stdout.write_all(text.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one raw input line. `None` means no response is owed.
    async fn handle_line(&self, line: &str) -> Option<Value> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                return Some(response_error(
                    &Value::Null,
                    PARSE_ERROR,
                    &format!("invalid JSON: {}", e),
                ));
            }
        };

        debug!(method = %request.method, "request");
        let id = match &request.id {
            Some(id) => id.clone(),
            // A notification; process nothing and reply nothing.
            None => return None,
        };

        Some(self.dispatch(&id, &request.method, &request.params).await)
    }

    async fn dispatch(&self, id: &Value, method: &str, params: &Value) -> Value {
        match method {
            "initialize" => response_ok(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": {},
                        "resources": {},
                    },
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),

            "ping" => response_ok(id, json!({})),

            "tools/list" => response_ok(id, json!({ "tools": list_tools() })),

            "tools/call" => {
                let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
                    return response_error(id, INVALID_PARAMS, "missing tool name");
                };
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                let result = call_tool(&self.service, name, &arguments).await;
                match serde_json::to_value(&result) {
                    Ok(value) => response_ok(id, value),
                    Err(e) => response_error(id, INTERNAL_ERROR, &e.to_string()),
                }
            }

            "resources/list" => response_ok(id, json!({ "resources": list_resources() })),

            "resources/read" => {
                let Some(uri) = params.get("uri").and_then(|v| v.as_str()) else {
                    return response_error(id, INVALID_PARAMS, "missing resource uri");
                };
                match read_resource(uri, &self.config) {
                    Some(text) => response_ok(
                        id,
                        json!({
                            "contents": [{
                                "uri": uri,
                                "mimeType": "text/markdown",
                                "text": text,
                            }]
                        }),
                    ),
                    None => response_error(
                        id,
                        INVALID_PARAMS,
                        &format!("unknown resource: {}", uri),
                    ),
                }
            }

            other => response_error(
                id,
                METHOD_NOT_FOUND,
                &format!("unknown method: {}", other),
            ),
        }
    }
}
