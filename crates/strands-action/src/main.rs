mod agent;
mod aws;
mod config;
mod kb;
mod mcp;
mod model;
mod run;
mod session;
mod summary;
mod telemetry;
mod tools;

use std::process::ExitCode;

use env_flags::env_flags;
use once_cell::sync::OnceCell;

use crate::config::RunnerConfig;
use crate::run::{ExitPath, run_agent};

const USAGE: &str = "\
Usage: strands-action [PROMPT...]

Run an autonomous GitHub agent once with the given task prompt.

Environment variables:
  STRANDS_PROMPT             Task prompt (takes precedence over CLI args)
  STRANDS_PROVIDER           Model provider: bedrock, openai, litellm, ollama
  STRANDS_MODEL_ID           Model identifier
  STRANDS_TOOLS              Tools config (format: pkg:tool1,tool2;pkg2:tool3)
  STRANDS_LOAD_MCP_SERVERS   Enable MCP server loading (default: true)
  MCP_SERVERS                JSON config for MCP servers
  SYSTEM_PROMPT              Base system prompt
  GITHUB_CONTEXT             GitHub event/workflow context
  STRANDS_KNOWLEDGE_BASE_ID  Bedrock knowledge base for retrieval and storage
  S3_SESSION_BUCKET          S3 bucket for session persistence
  SESSION_ID                 Session id override
  LANGFUSE_BASE_URL          Langfuse endpoint for telemetry
";

fn init_tracing() {
    env_flags! {
        /// Tracing filter, e.g. "info", "debug", or targets format.
        RUST_LOG: &str = "info";
        /// Preferred filter env (alias). If set, overrides RUST_LOG.
        TRACING_FILTER: &str = "";
        /// Compact single-line formatting for logs (ignored if TRACING_JSON=true)
        TRACING_COMPACT: bool = true;
        /// JSON formatting for logs
        TRACING_JSON: bool = false;
        /// If true, also log to a daily file under LOG_DIR
        LOG_TO_FILE: bool = false;
        /// Log directory used when LOG_TO_FILE=true
        LOG_DIR: &str = ".";
    }

    use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

    let rust_log = if !(*TRACING_FILTER).is_empty() {
        (*TRACING_FILTER).to_string()
    } else {
        (*RUST_LOG).to_string()
    };
    let filter = EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout stays clean for the agent result.
    let base = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(if *TRACING_JSON {
        base.json().boxed()
    } else if *TRACING_COMPACT {
        base.compact().boxed()
    } else {
        base.boxed()
    });

    static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
    if *LOG_TO_FILE {
        let appender = tracing_appender::rolling::daily((*LOG_DIR).to_string(), "strands-action.log");
        let (nb, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file = tracing_subscriber::fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_target(true)
            .with_ansi(false)
            .with_writer(nb);
        layers.push(if *TRACING_JSON {
            file.json().boxed()
        } else if *TRACING_COMPACT {
            file.compact().boxed()
        } else {
            file.boxed()
        });
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);
    if let Err(e) = subscriber.try_init() {
        tracing::debug!("tracing already set: {:?}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let cfg = RunnerConfig::from_env();
    let Some(prompt) = cfg.resolve_prompt(&args) else {
        eprintln!("error: no prompt given (set STRANDS_PROMPT or pass it as arguments)\n");
        eprint!("{USAGE}");
        return ExitCode::from(2);
    };

    let outcome = run_agent(&cfg, &prompt).await;
    match outcome.exit_path {
        // Force-exit so a remote server that ignored shutdown cannot keep the
        // process alive past the run.
        ExitPath::Abrupt => std::process::exit(outcome.code.into()),
        ExitPath::Graceful => ExitCode::from(outcome.code),
    }
}
