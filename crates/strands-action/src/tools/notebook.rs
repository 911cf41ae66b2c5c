//! Scratch notebook tool.
//!
//! Append-only markdown notes the agent can write for itself across turns;
//! the file lives in the workspace and survives for the duration of the run.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use super::{Tool, ToolContext, opt_str, require_str};

pub struct NotebookTool;

#[async_trait]
impl Tool for NotebookTool {
    fn name(&self) -> &str {
        "notebook"
    }

    fn description(&self) -> &str {
        "Keep working notes: write appends a timestamped entry, read returns them all"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["write", "read"] },
                "content": { "type": "string", "description": "Entry text for write" }
            },
            "required": ["action"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        match require_str(&args, "action")? {
            "write" => {
                let content = opt_str(&args, "content").unwrap_or_default();
                let entry = format!("## {}\n{}\n\n", Utc::now().format("%Y-%m-%d %H:%M:%S"), content);
                let existing = tokio::fs::read_to_string(&ctx.notebook_path)
                    .await
                    .unwrap_or_default();
                tokio::fs::write(&ctx.notebook_path, existing + &entry).await?;
                Ok("noted".to_string())
            }
            "read" => Ok(tokio::fs::read_to_string(&ctx.notebook_path)
                .await
                .unwrap_or_else(|_| "(notebook is empty)".to_string())),
            other => anyhow::bail!("unknown notebook action {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_appends_and_read_returns_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ToolContext::for_tests();
        ctx.notebook_path = dir.path().join("notebook.md");

        NotebookTool
            .invoke(&ctx, json!({"action": "write", "content": "first finding"}))
            .await
            .unwrap();
        NotebookTool
            .invoke(&ctx, json!({"action": "write", "content": "second finding"}))
            .await
            .unwrap();
        let out = NotebookTool
            .invoke(&ctx, json!({"action": "read"}))
            .await
            .unwrap();
        let first = out.find("first finding").unwrap();
        let second = out.find("second finding").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn reading_an_empty_notebook_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ToolContext::for_tests();
        ctx.notebook_path = dir.path().join("missing.md");
        let out = NotebookTool
            .invoke(&ctx, json!({"action": "read"}))
            .await
            .unwrap();
        assert!(out.contains("empty"));
    }
}
