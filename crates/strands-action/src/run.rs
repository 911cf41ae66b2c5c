//! Top-level run orchestration.
//!
//! Assembles the configured tools, MCP clients, model backend and session
//! store, runs the agent once, then records the step summary and optional
//! knowledge-base write-back. Subsystem failures (telemetry, summary, KB,
//! session persistence) are logged and skipped; only an error escaping the
//! agent invocation itself fails the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::agent::{AgentBuilder, TraceAttributes};
use crate::config::RunnerConfig;
use crate::kb::KnowledgeBaseClient;
use crate::mcp::{self, McpToolClient};
use crate::model::create_model;
use crate::session::{S3SessionStore, SessionRecord, SessionStore};
use crate::summary::{self, SummaryBlock};
use crate::telemetry;
use crate::tools::{self, ToolContext};

/// How the process should leave once the run is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPath {
    /// `std::process::exit` without unwinding.
    Abrupt,
    /// Return the code from `main` and let destructors run.
    Graceful,
}

/// Abrupt exit is the backstop for servers that ignore shutdown and keep
/// background listeners alive; test mode always takes the graceful path so
/// runs stay deterministic.
pub fn termination_path(has_mcp_clients: bool, test_mode: bool) -> ExitPath {
    if has_mcp_clients && !test_mode {
        ExitPath::Abrupt
    } else {
        ExitPath::Graceful
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub code: u8,
    pub exit_path: ExitPath,
}

/// Execute one agent run. Never panics; always reports an outcome.
pub async fn run_agent(cfg: &RunnerConfig, prompt: &str) -> RunOutcome {
    let mut has_mcp_clients = false;
    let code = match run_inner(cfg, prompt, &mut has_mcp_clients).await {
        Ok(()) => 0,
        Err(error) => {
            error!(error = %format!("{error:#}"), "agent run failed");
            1
        }
    };
    RunOutcome {
        code,
        exit_path: termination_path(has_mcp_clients, cfg.test_mode),
    }
}

async fn run_inner(
    cfg: &RunnerConfig,
    prompt: &str,
    has_mcp_clients: &mut bool,
) -> anyhow::Result<()> {
    let otlp = telemetry::setup_otel(cfg);
    if cfg.tools_directory {
        warn!("STRANDS_TOOLS_DIRECTORY is set but directory tool loading is not supported; ignoring");
    }

    // Configured tools plus the fixed GitHub and auxiliary bundles.
    let mut handles = tools::parse_tools_config(&cfg.tools_config);
    if cfg.repository.is_some() {
        handles.extend(tools::github_bundle());
    } else {
        warn!("GITHUB_REPOSITORY is not set; skipping the GitHub tool bundle");
    }
    handles.extend(tools::aux_bundle());

    let model = create_model(&cfg.provider)?;
    info!(provider = %cfg.provider, model = %model.model_id(), "model backend ready");
    let kb = cfg
        .knowledge_base_id
        .as_ref()
        .map(|_| Arc::new(KnowledgeBaseClient::from_env()));
    let ctx = Arc::new(ToolContext {
        repository: cfg.repository.clone(),
        bypass_tool_consent: cfg.bypass_tool_consent,
        tool_console_mode: cfg.tool_console_mode,
        editor_disable_backup: cfg.editor_disable_backup,
        notebook_path: PathBuf::from(".agent_notebook.md"),
        knowledge_base_id: cfg.knowledge_base_id.clone(),
        kb,
        model: Some(model.clone()),
        system_prompt: RwLock::new(cfg.system_prompt()),
        handoff_requested: AtomicBool::new(false),
    });

    let session_id = cfg.session_id();
    let trace = TraceAttributes {
        session_id: session_id.clone(),
        user_id: cfg.actor.clone().unwrap_or_else(|| "unknown".into()),
        repository: cfg.repository.clone().unwrap_or_else(|| "unknown".into()),
        workflow: cfg.workflow.clone().unwrap_or_else(|| "unknown".into()),
        run_id: cfg.run_id.clone().unwrap_or_else(|| "unknown".into()),
        tags: vec!["Strands-Agents".into(), "GitHub-Action".into()],
        otlp,
    };

    let mut builder = AgentBuilder::new(model, ctx, trace).with_tools(handles);
    for client in connect_mcp_clients(cfg).await {
        builder = builder.with_mcp_client(client);
    }
    let agent = builder.build();
    *has_mcp_clients = agent.has_mcp_clients();
    info!(tool_count = agent.tool_names().len(), "agent created");

    let store: Option<S3SessionStore> = cfg
        .s3_session_bucket
        .clone()
        .map(|bucket| S3SessionStore::new(bucket, cfg.s3_session_prefix.clone()));
    if let Some(store) = &store {
        info!(%session_id, "S3 session store active");
        match store.load(&session_id).await {
            Ok(Some(record)) => info!(prior = %record.timestamp, "previous session found"),
            Ok(None) => {}
            Err(error) => warn!(%error, "session load failed"),
        }
    }

    // Knowledge base retrieval before execution, best-effort. The recorded
    // exchange is replayed into the run so the model sees the passages.
    if cfg.knowledge_base_id.is_some() && agent.tool_names().contains(&"retrieve") {
        match agent
            .call_tool_recorded("retrieve", json!({ "text": prompt }))
            .await
        {
            Ok(passages) => info!(bytes = passages.len(), "KB retrieval recorded"),
            Err(error) => warn!(%error, "KB retrieval failed"),
        }
    }

    let result = match agent.run(prompt).await {
        Ok(result) => result,
        Err(error) => {
            agent.shutdown().await;
            return Err(error);
        }
    };

    if let Some(path) = &cfg.step_summary_path {
        let block = SummaryBlock {
            prompt,
            result: &result,
            session_id: &session_id,
            knowledge_base_id: cfg.knowledge_base_id.as_deref(),
        };
        if let Err(error) = summary::append(path, &block).await {
            warn!(%error, "failed to write step summary");
        }
    }

    // Knowledge base write-back after execution, best-effort.
    if cfg.knowledge_base_id.is_some() && agent.tool_names().contains(&"store_in_kb") {
        let args = json!({
            "content": format!("Input: {prompt}\nResult: {result}"),
            "title": format!("GitHub Agent: {}", truncate_chars(prompt, 1000)),
        });
        if let Err(error) = agent.call_tool_direct("store_in_kb", args).await {
            warn!(%error, "KB storage failed");
        }
    }

    if let Some(store) = &store {
        let record = SessionRecord {
            session_id: session_id.clone(),
            repository: cfg.repository.clone(),
            prompt: prompt.to_string(),
            result: result.clone(),
            timestamp: Utc::now(),
        };
        if let Err(error) = store.save(&record).await {
            warn!(%error, "session save failed");
        }
    }

    agent.shutdown().await;
    info!("agent completed successfully");
    Ok(())
}

/// Connect every enabled MCP server. Per-server failures are logged and that
/// server skipped.
async fn connect_mcp_clients(cfg: &RunnerConfig) -> Vec<McpToolClient> {
    if !cfg.load_mcp_servers {
        info!("MCP server loading disabled");
        return Vec::new();
    }
    let Some(raw) = &cfg.mcp_servers_json else {
        return Vec::new();
    };
    let mut clients = Vec::new();
    for def in mcp::parse_mcp_servers(raw) {
        match McpToolClient::connect(&def, mcp::DEFAULT_PHASE_TIMEOUT).await {
            Ok(client) => {
                info!(server = %def.name, tool_count = client.tools().len(), "MCP server loaded");
                clients.push(client);
            }
            Err(error) => warn!(server = %def.name, %error, "failed to load MCP server"),
        }
    }
    clients
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
