//! Session persistence.
//!
//! When `S3_SESSION_BUCKET` is set, a session record is stored as one JSON
//! object per session id; otherwise session state stays in memory for the
//! single run. Records are keyed `{prefix}{session_id}.json`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use anyhow::{Context as _, bail};

use crate::aws::{self, AwsCredentials, SignableRequest};

/// Durable state for one agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub repository: Option<String>,
    pub prompt: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>>;
    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()>;
}

pub struct S3SessionStore {
    bucket: String,
    prefix: String,
    region: String,
    client: reqwest::Client,
}

impl S3SessionStore {
    pub fn new(bucket: String, prefix: String) -> Self {
        S3SessionStore {
            bucket,
            prefix,
            region: aws::default_region(),
            client: reqwest::Client::new(),
        }
    }

    fn host(&self) -> String {
        format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
    }

    fn path(&self, session_id: &str) -> String {
        format!("/{}", aws::uri_encode_path(&object_key(&self.prefix, session_id)))
    }
}

/// S3 object key for a session record.
pub fn object_key(prefix: &str, session_id: &str) -> String {
    format!("{prefix}{session_id}.json")
}

#[async_trait]
impl SessionStore for S3SessionStore {
    async fn load(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let creds = AwsCredentials::from_env()?;
        let host = self.host();
        let path = self.path(session_id);
        let headers = aws::sign(
            &creds,
            &SignableRequest {
                method: "GET",
                host: &host,
                path: &path,
                region: &self.region,
                service: "s3",
                body: b"",
            },
            Utc::now(),
        );
        let mut request = self.client.get(format!("https://{host}{path}"));
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.send().await.context("S3 session load failed")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("S3 session load error {status}: {text}");
        }
        let record = response
            .json()
            .await
            .context("S3 session record parse failed")?;
        Ok(Some(record))
    }

    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()> {
        let creds = AwsCredentials::from_env()?;
        let body = serde_json::to_vec(record)?;
        let host = self.host();
        let path = self.path(&record.session_id);
        let headers = aws::sign(
            &creds,
            &SignableRequest {
                method: "PUT",
                host: &host,
                path: &path,
                region: &self.region,
                service: "s3",
                body: &body,
            },
            Utc::now(),
        );
        let mut request = self.client.put(format!("https://{host}{path}")).body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.send().await.context("S3 session save failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("S3 session save error {status}: {text}");
        }
        debug!(session_id = %record.session_id, "session record saved");
        Ok(())
    }
}
