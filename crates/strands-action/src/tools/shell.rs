//! Shell command tool.
//!
//! Runs `sh -c <command>` in the workspace. In CI the consent gate is
//! bypassed by default (`BYPASS_TOOL_CONSENT=true`); with the bypass off
//! there is no interactive terminal to ask on, so execution is refused.

use std::time::Duration;

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::{Tool, ToolContext, require_str};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output and exit status"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Command to run with sh -c" }
            },
            "required": ["command"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let command = require_str(&args, "command")?;
        if !ctx.bypass_tool_consent {
            return Err(anyhow!(
                "shell execution requires consent and no interactive terminal is available"
            ));
        }
        if ctx.tool_console_mode {
            info!(%command, "shell");
        }

        let output = tokio::time::timeout(
            COMMAND_TIMEOUT,
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .output(),
        )
        .await
        .map_err(|_| anyhow!("command timed out after {}s", COMMAND_TIMEOUT.as_secs()))?
        .context("failed to spawn sh")?;

        let result = json!({
            "status": output.status.code(),
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
        });
        Ok(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_status() {
        let ctx = ToolContext::for_tests();
        let out = ShellTool
            .invoke(&ctx, json!({"command": "printf hello"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["status"], 0);
        assert_eq!(parsed["stdout"], "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_an_error() {
        let ctx = ToolContext::for_tests();
        let out = ShellTool
            .invoke(&ctx, json!({"command": "exit 3"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["status"], 3);
    }

    #[tokio::test]
    async fn refuses_without_consent_bypass() {
        let mut ctx = ToolContext::for_tests();
        ctx.bypass_tool_consent = false;
        let err = ShellTool
            .invoke(&ctx, json!({"command": "true"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("consent"));
    }

    #[tokio::test]
    async fn missing_command_argument_errors() {
        let ctx = ToolContext::for_tests();
        assert!(ShellTool.invoke(&ctx, json!({})).await.is_err());
    }
}
