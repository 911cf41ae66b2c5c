//! AWS Bedrock backend over the non-streaming Converse API.
//!
//! Requests go to `POST /model/{modelId}/converse` on the regional
//! bedrock-runtime endpoint, signed with SigV4. Tool definitions map to
//! `toolConfig.tools[].toolSpec` and tool-use requests come back as
//! `toolUse` content blocks.

use anyhow::{Context as _, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::aws::{self, AwsCredentials, SignableRequest};

use super::{ChatMessage, ModelBackend, ModelReply, ToolCall, ToolSpec};

const DEFAULT_MODEL_ID: &str = "us.anthropic.claude-sonnet-4-20250514-v1:0";

pub struct BedrockBackend {
    model: String,
    region: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl BedrockBackend {
    pub fn from_env() -> Self {
        BedrockBackend {
            model: std::env::var("STRANDS_MODEL_ID")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            region: aws::default_region(),
            max_tokens: 4096,
            temperature: 0.2,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelBackend for BedrockBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn converse(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> anyhow::Result<ModelReply> {
        let creds = AwsCredentials::from_env()?;
        let body = build_request_body(
            system_prompt,
            messages,
            tools,
            self.max_tokens,
            self.temperature,
        );
        let body_bytes = serde_json::to_vec(&body)?;

        let host = format!("bedrock-runtime.{}.amazonaws.com", self.region);
        let path = format!("/model/{}/converse", aws::uri_encode_path(&self.model));
        let headers = aws::sign(
            &creds,
            &SignableRequest {
                method: "POST",
                host: &host,
                path: &path,
                region: &self.region,
                service: "bedrock",
                body: &body_bytes,
            },
            chrono::Utc::now(),
        );

        debug!(model = %self.model, region = %self.region, "sending Bedrock converse request");

        let mut request = self
            .client
            .post(format!("https://{host}{path}"))
            .body(body_bytes);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.send().await.context("Bedrock request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("Bedrock error {status}: {text}");
        }
        let body: Value = response
            .json()
            .await
            .context("Bedrock response parse failed")?;
        Ok(parse_reply(&body))
    }
}

/// Build the Converse request body. Pure; tests cover the mapping directly.
fn build_request_body(
    system_prompt: &str,
    messages: &[ChatMessage],
    tools: &[ToolSpec],
    max_tokens: u32,
    temperature: f32,
) -> Value {
    let wire_messages: Vec<Value> = messages
        .iter()
        .map(|m| match m {
            ChatMessage::User { text } => json!({
                "role": "user",
                "content": [{ "text": text }],
            }),
            ChatMessage::Assistant { text, tool_calls } => {
                let mut content = Vec::new();
                if !text.is_empty() {
                    content.push(json!({ "text": text }));
                }
                for call in tool_calls {
                    content.push(json!({
                        "toolUse": {
                            "toolUseId": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }
                    }));
                }
                json!({ "role": "assistant", "content": content })
            }
            ChatMessage::ToolResult { call_id, content } => json!({
                "role": "user",
                "content": [{
                    "toolResult": {
                        "toolUseId": call_id,
                        "content": [{ "text": content }],
                    }
                }],
            }),
        })
        .collect();

    let mut body = json!({
        "system": [{ "text": system_prompt }],
        "messages": wire_messages,
        "inferenceConfig": {
            "maxTokens": max_tokens,
            "temperature": temperature,
        }
    });
    if !tools.is_empty() {
        let specs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.schema },
                    }
                })
            })
            .collect();
        body["toolConfig"] = json!({ "tools": specs });
    }
    body
}

/// Extract text and tool-use blocks from a Converse response.
fn parse_reply(body: &Value) -> ModelReply {
    let mut reply = ModelReply::default();
    let content = body
        .pointer("/output/message/content")
        .and_then(Value::as_array);
    let Some(parts) = content else {
        return reply;
    };
    let mut texts = Vec::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str)
            && !text.is_empty()
        {
            texts.push(text.to_string());
        }
        if let Some(tool_use) = part.get("toolUse") {
            reply.tool_calls.push(ToolCall {
                id: tool_use
                    .get("toolUseId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                name: tool_use
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                arguments: tool_use.get("input").cloned().unwrap_or(json!({})),
            });
        }
    }
    reply.text = texts.join("\n");
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_maps_history_to_converse_roles() {
        let messages = vec![
            ChatMessage::User {
                text: "list open issues".into(),
            },
            ChatMessage::Assistant {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "t1".into(),
                    name: "list_issues".into(),
                    arguments: json!({"state": "open"}),
                }],
            },
            ChatMessage::ToolResult {
                call_id: "t1".into(),
                content: "[]".into(),
            },
        ];
        let body = build_request_body("sys", &messages, &[], 4096, 0.2);
        assert_eq!(body["system"][0]["text"], "sys");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(
            body["messages"][1]["content"][0]["toolUse"]["name"],
            "list_issues"
        );
        // Tool results travel back as user-role toolResult blocks.
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(
            body["messages"][2]["content"][0]["toolResult"]["toolUseId"],
            "t1"
        );
        assert!(body.get("toolConfig").is_none());
    }

    #[test]
    fn tool_specs_become_tool_config() {
        let tools = vec![ToolSpec {
            name: "shell".into(),
            description: "Run a command".into(),
            schema: json!({"type": "object"}),
        }];
        let body = build_request_body("sys", &[], &tools, 4096, 0.2);
        let spec = &body["toolConfig"]["tools"][0]["toolSpec"];
        assert_eq!(spec["name"], "shell");
        assert_eq!(spec["inputSchema"]["json"]["type"], "object");
    }

    #[test]
    fn reply_parsing_extracts_text_and_tool_use() {
        let body = json!({
            "output": { "message": { "content": [
                { "text": "Working on it." },
                { "toolUse": {
                    "toolUseId": "abc",
                    "name": "shell",
                    "input": {"command": "ls"}
                }}
            ]}}
        });
        let reply = parse_reply(&body);
        assert_eq!(reply.text, "Working on it.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "shell");
        assert_eq!(reply.tool_calls[0].arguments["command"], "ls");
    }

    #[test]
    fn reply_parsing_tolerates_empty_response() {
        let reply = parse_reply(&json!({}));
        assert!(reply.text.is_empty());
        assert!(reply.tool_calls.is_empty());
    }
}
