//! MCP client lifecycle: connect, discover tools, call, shut down.
//!
//! Every phase runs under a timeout so a stuck server cannot hang the run.
//! Clients are owned by the agent and shut down explicitly on every exit
//! path; there are no detached background listeners to force-kill.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::anyhow;
use rust_mcp_sdk::McpClient;
use rust_mcp_sdk::mcp_client::{ClientHandlerCore, ClientRuntime, client_runtime_core};
use rust_mcp_sdk::schema::schema_utils::{
    NotificationFromServer, RequestFromServer, ResultFromClient,
};
use rust_mcp_sdk::schema::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    LATEST_PROTOCOL_VERSION, RpcError,
};
use rust_mcp_sdk::{
    ClientSseTransport, ClientSseTransportOptions, StdioTransport, TransportOptions,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{McpServerDef, McpTransport};

pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(30);

/// One tool discovered on a connected server.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    /// Name exposed to the agent, `{prefix}_{remote_name}`.
    pub prefixed_name: String,
    /// Name the server knows the tool by.
    pub remote_name: String,
    pub description: Option<String>,
    pub schema: Value,
}

/// A connected MCP server with its discovered tool list.
pub struct McpToolClient {
    pub name: String,
    client: Arc<ClientRuntime>,
    tools: Vec<McpToolInfo>,
    timeout: Duration,
}

impl McpToolClient {
    /// Connect to the server, initialize the protocol and list tools.
    /// Tools named in `disabledTools` are dropped from the discovered set.
    pub async fn connect(def: &McpServerDef, timeout: Duration) -> anyhow::Result<Self> {
        let client_details = InitializeRequestParams {
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "strands-action".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            },
            protocol_version: LATEST_PROTOCOL_VERSION.into(),
        };
        let handler = NoopClientHandler;

        let client = match &def.transport {
            McpTransport::Stdio { command, args, env } => {
                let env: HashMap<String, String> = env.iter().cloned().collect();
                let transport = StdioTransport::create_with_server_launch(
                    command,
                    args.clone(),
                    Some(env),
                    TransportOptions::default(),
                )
                .map_err(|e| anyhow!("transport error: {e}"))?;
                client_runtime_core::create_client(client_details, transport, handler)
            }
            McpTransport::Sse { url, headers } | McpTransport::StreamableHttp { url, headers } => {
                // TODO: switch to a dedicated streamable-http client transport
                // once rust-mcp-sdk exposes one; the SSE client covers both
                // remote kinds for now.
                let custom_headers: HashMap<String, String> = headers.iter().cloned().collect();
                let options = ClientSseTransportOptions {
                    custom_headers: Some(custom_headers),
                    ..Default::default()
                };
                let transport = ClientSseTransport::new(url, options)
                    .map_err(|e| anyhow!("transport error: {e}"))?;
                client_runtime_core::create_client(client_details, transport, handler)
            }
        };

        tokio::time::timeout(timeout, client.clone().start())
            .await
            .map_err(|_| anyhow!("start timeout"))
            .and_then(|r| r.map_err(|e| anyhow!("start error: {e}")))?;

        let tools_resp = tokio::time::timeout(timeout, client.list_tools(None))
            .await
            .map_err(|_| anyhow!("list_tools timeout"))
            .and_then(|r| r.map_err(|e| anyhow!("list_tools error: {e}")))?;

        let mut tools = Vec::new();
        for tool in tools_resp.tools {
            if def.disabled_tools.iter().any(|d| d == &tool.name) {
                debug!(server = %def.name, tool = %tool.name, "tool disabled by config");
                continue;
            }
            let schema = serde_json::to_value(&tool.input_schema).unwrap_or(Value::Null);
            tools.push(McpToolInfo {
                prefixed_name: format!("{}_{}", def.prefix, tool.name),
                remote_name: tool.name,
                description: tool.description,
                schema,
            });
        }
        debug!(server = %def.name, tool_count = tools.len(), "MCP server connected");

        Ok(McpToolClient {
            name: def.name.clone(),
            client,
            tools,
            timeout,
        })
    }

    pub fn tools(&self) -> &[McpToolInfo] {
        &self.tools
    }

    /// Invoke a tool by its remote (unprefixed) name and flatten the result
    /// content to text. A result marked as an error becomes an `Err`.
    pub async fn call(&self, remote_name: &str, arguments: Value) -> anyhow::Result<String> {
        let params = CallToolRequestParams {
            name: remote_name.to_string(),
            arguments: arguments.as_object().cloned(),
        };
        let result = tokio::time::timeout(self.timeout, self.client.call_tool(params))
            .await
            .map_err(|_| anyhow!("call_tool timeout"))
            .and_then(|r| r.map_err(|e| anyhow!("call_tool error: {e}")))?;

        let value = serde_json::to_value(&result).unwrap_or(Value::Null);
        let text = flatten_content(&value);
        if value.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(anyhow!("tool reported an error: {text}"));
        }
        Ok(text)
    }

    /// Terminate the session and reap the transport. Failures are logged, not
    /// propagated; shutdown runs on error paths too.
    pub async fn shutdown(&self) {
        match tokio::time::timeout(self.timeout, self.client.shut_down()).await {
            Ok(Ok(())) => debug!(server = %self.name, "MCP client shut down"),
            Ok(Err(error)) => warn!(server = %self.name, %error, "MCP shutdown error"),
            Err(_) => warn!(server = %self.name, "MCP shutdown timed out"),
        }
    }
}

/// Join the text blocks of a serialized `CallToolResult`.
fn flatten_content(result: &Value) -> String {
    let Some(items) = result.get("content").and_then(Value::as_array) else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone)]
struct NoopClientHandler;

#[async_trait::async_trait]
impl ClientHandlerCore for NoopClientHandler {
    async fn handle_request(
        &self,
        _request: RequestFromServer,
        _runtime: &dyn McpClient,
    ) -> std::result::Result<ResultFromClient, RpcError> {
        Err(RpcError::method_not_found())
    }

    async fn handle_notification(
        &self,
        _notification: NotificationFromServer,
        _runtime: &dyn McpClient,
    ) -> std::result::Result<(), RpcError> {
        Ok(())
    }

    async fn handle_error(
        &self,
        _error: &RpcError,
        _runtime: &dyn McpClient,
    ) -> std::result::Result<(), RpcError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_joins_text_blocks_in_order() {
        let result = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "second"}
            ]
        });
        assert_eq!(flatten_content(&result), "first\nsecond");
    }

    #[test]
    fn flatten_handles_missing_content() {
        assert_eq!(flatten_content(&json!({})), "");
        assert_eq!(flatten_content(&json!({"content": "not an array"})), "");
    }
}
