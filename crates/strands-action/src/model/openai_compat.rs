//! OpenAI-compatible chat completions backend.
//!
//! Serves the `openai`, `litellm` and `ollama` provider names; they differ
//! only in base URL and credential sourcing, the wire shape is identical.

use anyhow::{Context as _, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatMessage, ModelBackend, ModelReply, ToolCall, ToolSpec};

pub struct OpenAiCompatBackend {
    provider: String,
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    pub fn from_env(provider: &str) -> anyhow::Result<Self> {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let (base_url, api_key) = match provider {
            "openai" => (
                non_empty("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into()),
                Some(non_empty("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?),
            ),
            "litellm" => (
                non_empty("LITELLM_BASE_URL").context("LITELLM_BASE_URL not set")?,
                non_empty("LITELLM_API_KEY"),
            ),
            "ollama" => (
                format!(
                    "{}/v1",
                    non_empty("OLLAMA_HOST")
                        .unwrap_or_else(|| "http://localhost:11434".into())
                        .trim_end_matches('/')
                ),
                None,
            ),
            other => bail!("provider {other:?} is not OpenAI-compatible"),
        };
        Ok(OpenAiCompatBackend {
            provider: provider.to_string(),
            model: non_empty("STRANDS_MODEL_ID").unwrap_or_else(|| "gpt-4o".into()),
            base_url,
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn converse(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> anyhow::Result<ModelReply> {
        let body = build_request_body(&self.model, system_prompt, messages, tools);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(provider = %self.provider, model = %self.model, "sending chat completions request");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("{} request failed", self.provider))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("{} error {status}: {text}", self.provider);
        }
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("{} response parse failed", self.provider))?;
        Ok(parse_reply(&body))
    }
}

fn build_request_body(
    model: &str,
    system_prompt: &str,
    messages: &[ChatMessage],
    tools: &[ToolSpec],
) -> Value {
    let mut wire_messages = vec![json!({ "role": "system", "content": system_prompt })];
    for m in messages {
        match m {
            ChatMessage::User { text } => {
                wire_messages.push(json!({ "role": "user", "content": text }));
            }
            ChatMessage::Assistant { text, tool_calls } => {
                let mut msg = json!({ "role": "assistant", "content": text });
                if !tool_calls.is_empty() {
                    let calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    // arguments travel as a JSON-encoded string
                                    "arguments": c.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    msg["tool_calls"] = json!(calls);
                }
                wire_messages.push(msg);
            }
            ChatMessage::ToolResult { call_id, content } => {
                wire_messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": content,
                }));
            }
        }
    }

    let mut body = json!({ "model": model, "messages": wire_messages });
    if !tools.is_empty() {
        let specs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.schema,
                    }
                })
            })
            .collect();
        body["tools"] = json!(specs);
    }
    body
}

fn parse_reply(body: &Value) -> ModelReply {
    let mut reply = ModelReply::default();
    let Some(message) = body.pointer("/choices/0/message") else {
        return reply;
    };
    if let Some(text) = message.get("content").and_then(Value::as_str) {
        reply.text = text.to_string();
    }
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let function = call.get("function").cloned().unwrap_or(json!({}));
            let arguments = function
                .get("arguments")
                .and_then(Value::as_str)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or(json!({}));
            reply.tool_calls.push(ToolCall {
                id: call
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                name: function
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                arguments,
            });
        }
    }
    reply
}
