//! Agent core: tool registry, conversation loop, client lifecycle.
//!
//! The agent owns its MCP clients and shuts them down explicitly on every
//! exit path; nothing runs detached. The loop is a plain converse/dispatch
//! cycle: ask the model, execute any requested tools, feed results back,
//! stop when the model answers without tool calls, a handoff is requested,
//! or the turn cap is reached.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::bail;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::mcp::{McpToolClient, McpToolInfo};
use crate::model::{ChatMessage, ModelBackend, ToolCall, ToolSpec};
use crate::telemetry::OtlpSettings;
use crate::tools::{ToolContext, ToolHandle};

const MAX_TURNS: usize = 32;

/// Attributes attached to the run's traces.
#[derive(Debug, Clone)]
pub struct TraceAttributes {
    pub session_id: String,
    pub user_id: String,
    pub repository: String,
    pub workflow: String,
    pub run_id: String,
    pub tags: Vec<String>,
    pub otlp: Option<OtlpSettings>,
}

/// A tool known to the agent, builtin or discovered over MCP.
enum Registered {
    Builtin(ToolHandle),
    Mcp { client_index: usize, info: McpToolInfo },
}

impl Registered {
    fn spec(&self, name: &str) -> ToolSpec {
        match self {
            Registered::Builtin(tool) => ToolSpec {
                name: name.to_string(),
                description: tool.description().to_string(),
                schema: tool.input_schema(),
            },
            Registered::Mcp { info, .. } => ToolSpec {
                name: name.to_string(),
                description: info.description.clone().unwrap_or_default(),
                schema: info.schema.clone(),
            },
        }
    }
}

pub struct AgentBuilder {
    model: Arc<dyn ModelBackend>,
    ctx: Arc<ToolContext>,
    trace: TraceAttributes,
    tools: Vec<(String, Registered)>,
    mcp_clients: Vec<McpToolClient>,
}

impl AgentBuilder {
    pub fn new(model: Arc<dyn ModelBackend>, ctx: Arc<ToolContext>, trace: TraceAttributes) -> Self {
        AgentBuilder {
            model,
            ctx,
            trace,
            tools: Vec::new(),
            mcp_clients: Vec::new(),
        }
    }

    /// Register builtin tools. A repeated name overwrites the earlier entry,
    /// keeping the original position.
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolHandle>) -> Self {
        for tool in tools {
            insert(&mut self.tools, tool.name().to_string(), Registered::Builtin(tool));
        }
        self
    }

    /// Adopt a connected MCP client and register its discovered tools under
    /// their prefixed names.
    pub fn with_mcp_client(mut self, client: McpToolClient) -> Self {
        let client_index = self.mcp_clients.len();
        for info in client.tools() {
            insert(
                &mut self.tools,
                info.prefixed_name.clone(),
                Registered::Mcp {
                    client_index,
                    info: info.clone(),
                },
            );
        }
        self.mcp_clients.push(client);
        self
    }

    pub fn build(self) -> Agent {
        Agent {
            model: self.model,
            ctx: self.ctx,
            trace: self.trace,
            tools: self.tools,
            mcp_clients: self.mcp_clients,
            recorded: Mutex::new(Vec::new()),
        }
    }
}

fn insert(tools: &mut Vec<(String, Registered)>, name: String, entry: Registered) {
    match tools.iter_mut().find(|(existing, _)| *existing == name) {
        Some(slot) => {
            warn!(tool = %name, "duplicate tool name, later registration wins");
            slot.1 = entry;
        }
        None => tools.push((name, entry)),
    }
}

pub struct Agent {
    model: Arc<dyn ModelBackend>,
    ctx: Arc<ToolContext>,
    trace: TraceAttributes,
    tools: Vec<(String, Registered)>,
    mcp_clients: Vec<McpToolClient>,
    /// Tool exchanges recorded outside the loop, replayed into the next run.
    recorded: Mutex<Vec<ChatMessage>>,
}

impl Agent {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn has_mcp_clients(&self) -> bool {
        !self.mcp_clients.is_empty()
    }

    /// Invoke one registered tool outside the conversation loop.
    pub async fn call_tool_direct(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let Some((_, entry)) = self.tools.iter().find(|(n, _)| n == name) else {
            bail!("no tool named {name:?}");
        };
        self.dispatch(entry, args).await
    }

    /// Invoke a tool outside the loop and record the call and its result in
    /// the conversation history, so the model sees the exchange when the run
    /// starts. Used for the pre-run knowledge base retrieval.
    pub async fn call_tool_recorded(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let result = self.call_tool_direct(name, args.clone()).await?;
        let call_id = format!("direct-{}", Uuid::new_v4());
        let mut recorded = self.recorded.lock().await;
        recorded.push(ChatMessage::Assistant {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: call_id.clone(),
                name: name.to_string(),
                arguments: args,
            }],
        });
        recorded.push(ChatMessage::ToolResult {
            call_id,
            content: result.clone(),
        });
        Ok(result)
    }

    /// Run the conversation loop to completion and return the final text.
    pub async fn run(&self, prompt: &str) -> anyhow::Result<String> {
        info!(
            session_id = %self.trace.session_id,
            user_id = %self.trace.user_id,
            repository = %self.trace.repository,
            workflow = %self.trace.workflow,
            run_id = %self.trace.run_id,
            tags = ?self.trace.tags,
            otlp = self.trace.otlp.is_some(),
            tool_count = self.tools.len(),
            "agent run starting"
        );

        let specs: Vec<ToolSpec> = self
            .tools
            .iter()
            .map(|(name, entry)| entry.spec(name))
            .collect();
        let mut messages = vec![ChatMessage::User {
            text: prompt.to_string(),
        }];
        messages.append(&mut *self.recorded.lock().await);
        let mut last_text = String::new();

        for turn in 0..MAX_TURNS {
            let system = self.ctx.system_prompt.read().await.clone();
            let reply = self.model.converse(&system, &messages, &specs).await?;
            if !reply.text.is_empty() {
                last_text = reply.text.clone();
            }
            if reply.tool_calls.is_empty() {
                return Ok(last_text);
            }

            messages.push(ChatMessage::Assistant {
                text: reply.text,
                tool_calls: reply.tool_calls.clone(),
            });
            for call in reply.tool_calls {
                let result = match self.tools.iter().find(|(n, _)| *n == call.name) {
                    Some((_, entry)) => self
                        .dispatch(entry, call.arguments)
                        .await
                        .unwrap_or_else(|e| format!("Error: {e:#}")),
                    None => format!("Error: no tool named {:?}", call.name),
                };
                messages.push(ChatMessage::ToolResult {
                    call_id: call.id,
                    content: result,
                });
            }

            if self.ctx.handoff_requested.load(Ordering::SeqCst) {
                info!(turn, "stopping after handoff request");
                return Ok(last_text);
            }
        }
        warn!(max_turns = MAX_TURNS, "turn cap reached");
        Ok(last_text)
    }

    async fn dispatch(&self, entry: &Registered, args: Value) -> anyhow::Result<String> {
        match entry {
            Registered::Builtin(tool) => tool.invoke(&self.ctx, args).await,
            Registered::Mcp { client_index, info } => {
                self.mcp_clients[*client_index]
                    .call(&info.remote_name, args)
                    .await
            }
        }
    }

    /// Shut down every MCP client. Runs on success and failure paths alike.
    pub async fn shutdown(&self) {
        for client in &self.mcp_clients {
            client.shutdown().await;
        }
    }
}
