//! Sub-agent and system-prompt tools.
//!
//! `use_agent` and `create_subagent` run a one-shot completion against the
//! run's model backend with their own system prompt, letting the main agent
//! delegate a focused question without sharing its history. `system_prompt`
//! views or rewrites the live system prompt for subsequent turns.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{Tool, ToolContext, opt_str, require_str};

async fn one_shot(ctx: &ToolContext, system: &str, prompt: &str) -> anyhow::Result<String> {
    let model = ctx
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no model backend available for sub-agent"))?;
    let messages = vec![crate::model::ChatMessage::User {
        text: prompt.to_string(),
    }];
    let reply = model.converse(system, &messages, &[]).await?;
    Ok(reply.text)
}

pub struct UseAgentTool;

#[async_trait]
impl Tool for UseAgentTool {
    fn name(&self) -> &str {
        "use_agent"
    }

    fn description(&self) -> &str {
        "Ask a fresh agent instance a question with its own system prompt"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string" },
                "system_prompt": { "type": "string", "description": "Override for this call" }
            },
            "required": ["prompt"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let prompt = require_str(&args, "prompt")?;
        let system = match opt_str(&args, "system_prompt") {
            Some(s) => s.to_string(),
            None => ctx.system_prompt.read().await.clone(),
        };
        one_shot(ctx, &system, prompt).await
    }
}

pub struct CreateSubagentTool;

#[async_trait]
impl Tool for CreateSubagentTool {
    fn name(&self) -> &str {
        "create_subagent"
    }

    fn description(&self) -> &str {
        "Delegate a task to a named sub-agent and return its answer"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Label for the sub-agent" },
                "prompt": { "type": "string", "description": "Task for the sub-agent" },
                "system_prompt": { "type": "string", "description": "Sub-agent's system prompt" }
            },
            "required": ["prompt"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let prompt = require_str(&args, "prompt")?;
        let name = opt_str(&args, "name").unwrap_or("subagent");
        let run_id = Uuid::new_v4();
        let system = opt_str(&args, "system_prompt")
            .map(str::to_string)
            .unwrap_or_else(|| format!("You are {name}, a focused sub-agent. Answer directly."));
        info!(%name, %run_id, "running sub-agent");
        let answer = one_shot(ctx, &system, prompt).await?;
        Ok(format!("[{name} {run_id}]\n{answer}"))
    }
}

pub struct SystemPromptTool;

#[async_trait]
impl Tool for SystemPromptTool {
    fn name(&self) -> &str {
        "system_prompt"
    }

    fn description(&self) -> &str {
        "View or update the agent's system prompt for later turns"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["view", "update"] },
                "prompt": { "type": "string", "description": "New prompt for update" }
            },
            "required": ["action"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        match require_str(&args, "action")? {
            "view" => Ok(ctx.system_prompt.read().await.clone()),
            "update" => {
                let prompt = require_str(&args, "prompt")?;
                *ctx.system_prompt.write().await = prompt.to_string();
                Ok("system prompt updated".to_string())
            }
            other => anyhow::bail!("unknown system_prompt action {other:?}"),
        }
    }
}
