//! Human handoff tool.
//!
//! There is no interactive user in an Actions run, so a handoff cannot block
//! on input; it records the message and stops the agent loop after the
//! current turn so the summary surfaces the request.

use std::sync::atomic::Ordering;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::{Tool, ToolContext, opt_str};

pub struct HandoffTool;

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        "handoff_to_user"
    }

    fn description(&self) -> &str {
        "Hand control back to a human with a message; ends the agent run"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "description": "What the human should look at" }
            },
            "required": ["message"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let message = opt_str(&args, "message").unwrap_or("(no message)");
        info!(%message, "handoff requested");
        ctx.handoff_requested.store(true, Ordering::SeqCst);
        Ok(format!("Handed off to user: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invocation_sets_the_handoff_flag() {
        let ctx = ToolContext::for_tests();
        assert!(!ctx.handoff_requested.load(Ordering::SeqCst));
        let out = HandoffTool
            .invoke(&ctx, json!({"message": "please review PR #4"}))
            .await
            .unwrap();
        assert!(out.contains("please review PR #4"));
        assert!(ctx.handoff_requested.load(Ordering::SeqCst));
    }
}
