//! Knowledge base tools: `retrieve` and `store_in_kb`.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Tool, ToolContext, opt_str, require_str};

fn kb_handle(ctx: &ToolContext) -> anyhow::Result<(&crate::kb::KnowledgeBaseClient, &str)> {
    let kb = ctx
        .kb
        .as_deref()
        .ok_or_else(|| anyhow!("no knowledge base client available"))?;
    let kb_id = ctx
        .knowledge_base_id
        .as_deref()
        .ok_or_else(|| anyhow!("STRANDS_KNOWLEDGE_BASE_ID is not set"))?;
    Ok((kb, kb_id))
}

pub struct RetrieveTool;

#[async_trait]
impl Tool for RetrieveTool {
    fn name(&self) -> &str {
        "retrieve"
    }

    fn description(&self) -> &str {
        "Search the knowledge base for passages relevant to a query"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Query text" },
                "numberOfResults": { "type": "integer", "description": "Max passages, default 5" }
            },
            "required": ["text"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let (kb, kb_id) = kb_handle(ctx)?;
        let query = require_str(&args, "text")?;
        let max_results = args
            .get("numberOfResults")
            .and_then(Value::as_u64)
            .unwrap_or(5) as u32;
        let passages = kb.retrieve(kb_id, query, max_results).await?;
        if passages.is_empty() {
            Ok("No relevant passages found.".to_string())
        } else {
            Ok(passages.join("\n\n---\n\n"))
        }
    }
}

pub struct StoreInKbTool;

#[async_trait]
impl Tool for StoreInKbTool {
    fn name(&self) -> &str {
        "store_in_kb"
    }

    fn description(&self) -> &str {
        "Store a document in the knowledge base for future runs"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Document title" },
                "content": { "type": "string", "description": "Document body" }
            },
            "required": ["content"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let (kb, kb_id) = kb_handle(ctx)?;
        let content = require_str(&args, "content")?;
        let title = opt_str(&args, "title").unwrap_or("agent-note");
        kb.store(kb_id, title, content).await?;
        Ok(format!("stored {title:?} in knowledge base {kb_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn both_tools_require_kb_configuration() {
        let ctx = ToolContext::for_tests();
        let err = RetrieveTool
            .invoke(&ctx, json!({"text": "q"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("knowledge base"));
        let err = StoreInKbTool
            .invoke(&ctx, json!({"content": "c"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("knowledge base"));
    }
}
