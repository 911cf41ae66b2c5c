//! Built-in tools exposed to the agent.
//!
//! Each tool is a named object implementing [`Tool`]; the registry maps the
//! `STRANDS_TOOLS` configuration string onto concrete instances. Shared run
//! state (consent flags, GitHub coordinates, knowledge base, model handle)
//! travels through [`ToolContext`] instead of the process environment.

pub mod editor;
pub mod github;
pub mod handoff;
pub mod kb;
pub mod notebook;
pub mod registry;
pub mod shell;
pub mod subagent;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::kb::KnowledgeBaseClient;
use crate::model::ModelBackend;

pub use registry::{aux_bundle, github_bundle, parse_tools_config};

/// A named capability the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the tool's arguments.
    fn input_schema(&self) -> Value;
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String>;
}

pub type ToolHandle = Arc<dyn Tool>;

/// Run-scoped state shared by every tool invocation.
pub struct ToolContext {
    pub repository: Option<String>,
    pub bypass_tool_consent: bool,
    pub tool_console_mode: bool,
    pub editor_disable_backup: bool,
    /// Where the notebook tool keeps its entries.
    pub notebook_path: PathBuf,
    pub knowledge_base_id: Option<String>,
    pub kb: Option<Arc<KnowledgeBaseClient>>,
    /// Backend used by sub-agent tools for one-shot completions.
    pub model: Option<Arc<dyn ModelBackend>>,
    /// Live system prompt; the system_prompt tool reads and rewrites it.
    pub system_prompt: RwLock<String>,
    /// Set by handoff_to_user; stops the agent loop after the current turn.
    pub handoff_requested: AtomicBool,
}

impl ToolContext {
    /// Minimal context for tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ToolContext {
            repository: None,
            bypass_tool_consent: true,
            tool_console_mode: false,
            editor_disable_backup: true,
            notebook_path: PathBuf::from(".agent_notebook.md"),
            knowledge_base_id: None,
            kb: None,
            model: None,
            system_prompt: RwLock::new(String::new()),
            handoff_requested: AtomicBool::new(false),
        }
    }
}

/// Fetch a required string argument.
pub fn require_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing required argument {key:?}"))
}

/// Fetch an optional string argument; absent and non-string both yield `None`.
pub fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_str_reports_the_missing_key() {
        let err = require_str(&json!({}), "path").unwrap_err().to_string();
        assert!(err.contains("path"));
        assert_eq!(require_str(&json!({"path": "/x"}), "path").unwrap(), "/x");
    }

    #[test]
    fn opt_str_ignores_non_string_values() {
        assert_eq!(opt_str(&json!({"n": 3}), "n"), None);
        assert_eq!(opt_str(&json!({"n": "s"}), "n"), Some("s"));
    }
}
