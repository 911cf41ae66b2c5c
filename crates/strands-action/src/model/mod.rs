//! Model backend abstraction.
//!
//! The agent talks to every provider through [`ModelBackend`]: one
//! non-streaming exchange per call, with tool definitions in and tool-use
//! requests out. `bedrock` is served natively over the Converse API; the
//! other providers speak the OpenAI-compatible chat completions shape.

pub mod bedrock;
pub mod openai_compat;

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;

use bedrock::BedrockBackend;
use openai_compat::OpenAiCompatBackend;

/// A tool-use request emitted by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// One turn of conversation history.
#[derive(Debug, Clone)]
pub enum ChatMessage {
    User { text: String },
    Assistant { text: String, tool_calls: Vec<ToolCall> },
    ToolResult { call_id: String, content: String },
}

/// What the model produced for one exchange.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn model_id(&self) -> &str;

    /// One request/response exchange over the full history.
    async fn converse(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> anyhow::Result<ModelReply>;
}

/// Build the backend named by `STRANDS_PROVIDER`. Unknown names are rejected
/// with a descriptive error instead of falling back silently.
pub fn create_model(provider: &str) -> anyhow::Result<Arc<dyn ModelBackend>> {
    match provider {
        "bedrock" => Ok(Arc::new(BedrockBackend::from_env())),
        "openai" | "litellm" | "ollama" => {
            Ok(Arc::new(OpenAiCompatBackend::from_env(provider)?))
        }
        other => bail!(
            "unknown model provider {other:?}; expected one of bedrock, openai, litellm, ollama"
        ),
    }
}
