//! Bedrock knowledge base access.
//!
//! Retrieval goes through the bedrock-agent-runtime `retrieve` endpoint;
//! write-back ingests an inline custom document through the bedrock-agent
//! data source API, which needs `STRANDS_KB_DATA_SOURCE_ID` to be set. Both
//! directions are best-effort from the caller's point of view.

use anyhow::{Context as _, bail};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::aws::{self, AwsCredentials, SignableRequest};

pub struct KnowledgeBaseClient {
    region: String,
    data_source_id: Option<String>,
    client: reqwest::Client,
}

impl KnowledgeBaseClient {
    pub fn from_env() -> Self {
        KnowledgeBaseClient {
            region: aws::default_region(),
            data_source_id: std::env::var("STRANDS_KB_DATA_SOURCE_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    /// Query the knowledge base and return the matched passages.
    pub async fn retrieve(
        &self,
        kb_id: &str,
        query: &str,
        max_results: u32,
    ) -> anyhow::Result<Vec<String>> {
        let body = json!({
            "retrievalQuery": { "text": query },
            "retrievalConfiguration": {
                "vectorSearchConfiguration": { "numberOfResults": max_results }
            }
        });
        let host = format!("bedrock-agent-runtime.{}.amazonaws.com", self.region);
        let path = format!("/knowledgebases/{}/retrieve", aws::uri_encode_path(kb_id));
        let response = self.send("POST", &host, &path, &body).await?;
        Ok(parse_retrieval_results(&response))
    }

    /// Ingest one inline text document. Requires a configured data source.
    pub async fn store(&self, kb_id: &str, title: &str, content: &str) -> anyhow::Result<()> {
        let Some(data_source_id) = &self.data_source_id else {
            bail!("STRANDS_KB_DATA_SOURCE_ID is not set; cannot store documents");
        };
        let body = build_ingest_body(title, content);
        let host = format!("bedrock-agent.{}.amazonaws.com", self.region);
        let path = format!(
            "/knowledgebases/{}/datasources/{}/documents",
            aws::uri_encode_path(kb_id),
            aws::uri_encode_path(data_source_id),
        );
        self.send("PUT", &host, &path, &body).await?;
        debug!(%kb_id, %title, "stored knowledge base document");
        Ok(())
    }

    async fn send(
        &self,
        method: &'static str,
        host: &str,
        path: &str,
        body: &Value,
    ) -> anyhow::Result<Value> {
        let creds = AwsCredentials::from_env()?;
        let body_bytes = serde_json::to_vec(body)?;
        let headers = aws::sign(
            &creds,
            &SignableRequest {
                method,
                host,
                path,
                region: &self.region,
                service: "bedrock",
                body: &body_bytes,
            },
            chrono::Utc::now(),
        );
        let mut request = self
            .client
            .request(method.parse()?, format!("https://{host}{path}"))
            .body(body_bytes);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.send().await.context("knowledge base request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("knowledge base error {status}: {text}");
        }
        response
            .json()
            .await
            .context("knowledge base response parse failed")
    }
}

fn parse_retrieval_results(response: &Value) -> Vec<String> {
    response
        .get("retrievalResults")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r.pointer("/content/text").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn build_ingest_body(title: &str, content: &str) -> Value {
    json!({
        "documents": [{
            "content": {
                "dataSourceType": "CUSTOM",
                "custom": {
                    "customDocumentIdentifier": { "id": format!("{title}-{}", Uuid::new_v4()) },
                    "sourceType": "IN_LINE",
                    "inlineContent": {
                        "type": "TEXT",
                        "textContent": { "data": content }
                    }
                }
            }
        }]
    })
}
