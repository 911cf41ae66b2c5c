//! Runner configuration resolved once at process start.
//!
//! Every environment variable the runner recognizes is read exactly once into
//! [`RunnerConfig`]; components receive the struct (or fields of it) instead
//! of reading the process environment themselves.

use std::path::PathBuf;

/// Default tool configuration used when `STRANDS_TOOLS` is unset.
pub const DEFAULT_TOOLS: &str =
    "strands_tools:shell,retrieve,use_agent;strands_action:use_github,system_prompt,store_in_kb,create_subagent";

/// Default system prompt used when `SYSTEM_PROMPT` is unset.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an autonomous GitHub agent running inside a GitHub Actions workflow.";

/// All runner settings, resolved from the environment in one pass.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Task prompt override (`STRANDS_PROMPT`); takes precedence over CLI args.
    pub prompt: Option<String>,
    /// Model backend selector (`STRANDS_PROVIDER`), default `bedrock`.
    pub provider: String,
    /// Tool config string (`STRANDS_TOOLS`), `pkg:a,b;pkg2:c` format.
    pub tools_config: String,
    /// Whether to load MCP servers at all (`STRANDS_LOAD_MCP_SERVERS`).
    pub load_mcp_servers: bool,
    /// Raw MCP server descriptor JSON (`MCP_SERVERS`).
    pub mcp_servers_json: Option<String>,
    pub system_prompt_override: Option<String>,
    /// Structured event context (`GITHUB_CONTEXT`), appended as a fenced block.
    pub github_context: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub s3_session_bucket: Option<String>,
    pub s3_session_prefix: String,
    pub session_id_override: Option<String>,
    pub repository: Option<String>,
    pub run_id: Option<String>,
    pub actor: Option<String>,
    pub workflow: Option<String>,
    /// Path of the step summary file (`GITHUB_STEP_SUMMARY`), if provided.
    pub step_summary_path: Option<PathBuf>,
    pub langfuse_base_url: Option<String>,
    pub langfuse_public_key: Option<String>,
    pub langfuse_secret_key: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub otlp_headers: Option<String>,
    /// `STRANDS_TOOLS_DIRECTORY`: accepted for compatibility; the static
    /// registry cannot load tools dynamically, so enabling it only warns.
    pub tools_directory: bool,
    /// Test-mode marker; suppresses the abrupt exit path.
    pub test_mode: bool,
    /// `BYPASS_TOOL_CONSENT`, default true (non-interactive CI).
    pub bypass_tool_consent: bool,
    /// `STRANDS_TOOL_CONSOLE_MODE`, default enabled: echo tool output to logs.
    pub tool_console_mode: bool,
    /// `EDITOR_DISABLE_BACKUP`, default true: skip `.bak` files on edits.
    pub editor_disable_backup: bool,
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary lookup function. Tests use this to
    /// avoid mutating process-global environment state.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        RunnerConfig {
            // Kept raw: a set-but-blank prompt must not fall through to the
            // CLI arguments, see resolve_prompt.
            prompt: get("STRANDS_PROMPT"),
            provider: non_empty("STRANDS_PROVIDER").unwrap_or_else(|| "bedrock".to_string()),
            tools_config: non_empty("STRANDS_TOOLS").unwrap_or_else(|| DEFAULT_TOOLS.to_string()),
            load_mcp_servers: get("STRANDS_LOAD_MCP_SERVERS")
                .map(|v| is_true(&v))
                .unwrap_or(true),
            mcp_servers_json: non_empty("MCP_SERVERS"),
            system_prompt_override: non_empty("SYSTEM_PROMPT"),
            github_context: non_empty("GITHUB_CONTEXT"),
            knowledge_base_id: non_empty("STRANDS_KNOWLEDGE_BASE_ID"),
            s3_session_bucket: non_empty("S3_SESSION_BUCKET"),
            s3_session_prefix: get("S3_SESSION_PREFIX").unwrap_or_default(),
            session_id_override: non_empty("SESSION_ID"),
            repository: non_empty("GITHUB_REPOSITORY"),
            run_id: non_empty("GITHUB_RUN_ID"),
            actor: non_empty("GITHUB_ACTOR"),
            workflow: non_empty("GITHUB_WORKFLOW"),
            step_summary_path: non_empty("GITHUB_STEP_SUMMARY").map(PathBuf::from),
            langfuse_base_url: non_empty("LANGFUSE_BASE_URL"),
            langfuse_public_key: non_empty("LANGFUSE_PUBLIC_KEY"),
            langfuse_secret_key: non_empty("LANGFUSE_SECRET_KEY"),
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
            otlp_headers: non_empty("OTEL_EXPORTER_OTLP_HEADERS"),
            tools_directory: get("STRANDS_TOOLS_DIRECTORY")
                .map(|v| is_true(&v))
                .unwrap_or(false),
            test_mode: get("STRANDS_TEST_MODE").is_some()
                || get("PYTEST_CURRENT_TEST").is_some(),
            bypass_tool_consent: get("BYPASS_TOOL_CONSENT")
                .map(|v| truthy(&v))
                .unwrap_or(true),
            tool_console_mode: get("STRANDS_TOOL_CONSOLE_MODE")
                .map(|v| truthy(&v))
                .unwrap_or(true),
            editor_disable_backup: get("EDITOR_DISABLE_BACKUP")
                .map(|v| truthy(&v))
                .unwrap_or(true),
        }
    }

    /// Resolve the task prompt: the environment override wins verbatim,
    /// otherwise trailing CLI arguments are joined with spaces. Returns `None`
    /// when no usable prompt remains. A whitespace-only override still wins
    /// and yields `None` rather than falling through to the CLI arguments.
    pub fn resolve_prompt(&self, cli_args: &[String]) -> Option<String> {
        match self.prompt.as_deref() {
            Some(p) if !p.is_empty() => {
                if p.trim().is_empty() {
                    None
                } else {
                    Some(p.to_string())
                }
            }
            _ => {
                let joined = cli_args.join(" ");
                if joined.trim().is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
        }
    }

    /// Session identifier: explicit override, else derived from repository and
    /// run id with literal placeholders for missing pieces.
    pub fn session_id(&self) -> String {
        if let Some(id) = &self.session_id_override {
            return id.clone();
        }
        let repo = self.repository.as_deref().unwrap_or("unknown");
        let run_id = self.run_id.as_deref().unwrap_or("local");
        format!("gh-{}-{}", repo.replace('/', "-"), run_id)
    }

    /// System prompt: override or default, with the GitHub event context
    /// appended as a fenced block when present.
    pub fn system_prompt(&self) -> String {
        let base = self
            .system_prompt_override
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        match &self.github_context {
            Some(ctx) => format!("{base}\n\nGitHub Context:\n```{ctx}\n```"),
            None => base.to_string(),
        }
    }
}

/// Strict flag parsing: only a case-insensitive `true` enables. Used for the
/// flags the runner itself gates on.
fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// Lenient boolean parsing for the pass-through tool flags.
fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "enabled"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_from(pairs: &[(&str, &str)]) -> RunnerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn session_id_derives_from_repository_and_run_id() {
        let cfg = cfg_from(&[("GITHUB_REPOSITORY", "org/repo"), ("GITHUB_RUN_ID", "42")]);
        assert_eq!(cfg.session_id(), "gh-org-repo-42");
    }

    #[test]
    fn session_id_uses_placeholders_when_repo_and_run_missing() {
        let cfg = cfg_from(&[]);
        assert_eq!(cfg.session_id(), "gh-unknown-local");
    }

    #[test]
    fn session_id_override_wins() {
        let cfg = cfg_from(&[
            ("SESSION_ID", "custom-session"),
            ("GITHUB_REPOSITORY", "org/repo"),
            ("GITHUB_RUN_ID", "42"),
        ]);
        assert_eq!(cfg.session_id(), "custom-session");
    }

    #[test]
    fn nested_repository_slashes_are_all_replaced() {
        let cfg = cfg_from(&[("GITHUB_REPOSITORY", "a/b/c"), ("GITHUB_RUN_ID", "7")]);
        assert_eq!(cfg.session_id(), "gh-a-b-c-7");
    }

    #[test]
    fn env_prompt_wins_over_cli_args_verbatim() {
        let cfg = cfg_from(&[("STRANDS_PROMPT", "  do the thing  ")]);
        let args = vec!["ignored".to_string(), "args".to_string()];
        assert_eq!(cfg.resolve_prompt(&args).as_deref(), Some("  do the thing  "));
    }

    #[test]
    fn cli_args_joined_when_env_prompt_absent() {
        let cfg = cfg_from(&[]);
        let args = vec!["fix".to_string(), "issue".to_string(), "#3".to_string()];
        assert_eq!(cfg.resolve_prompt(&args).as_deref(), Some("fix issue #3"));
    }

    #[test]
    fn blank_prompt_sources_yield_none() {
        let cfg = cfg_from(&[]);
        assert_eq!(cfg.resolve_prompt(&[]), None);
        assert_eq!(cfg.resolve_prompt(&["   ".to_string()]), None);
    }

    #[test]
    fn whitespace_env_prompt_wins_and_yields_none() {
        // The override still takes precedence when set to whitespace; the CLI
        // arguments are not consulted.
        let cfg = cfg_from(&[("STRANDS_PROMPT", "   ")]);
        let args = vec!["usable".to_string(), "prompt".to_string()];
        assert_eq!(cfg.resolve_prompt(&args), None);
    }

    #[test]
    fn empty_env_prompt_falls_back_to_cli_args() {
        let cfg = cfg_from(&[("STRANDS_PROMPT", "")]);
        let args = vec!["fix".to_string(), "it".to_string()];
        assert_eq!(cfg.resolve_prompt(&args).as_deref(), Some("fix it"));
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let cfg = cfg_from(&[]);
        assert_eq!(cfg.provider, "bedrock");
        assert_eq!(cfg.tools_config, DEFAULT_TOOLS);
        assert!(cfg.load_mcp_servers);
        assert!(cfg.bypass_tool_consent);
        assert!(cfg.tool_console_mode);
        assert!(cfg.editor_disable_backup);
        assert!(!cfg.tools_directory);
        assert!(!cfg.test_mode);
    }

    #[test]
    fn load_mcp_servers_can_be_disabled() {
        let cfg = cfg_from(&[("STRANDS_LOAD_MCP_SERVERS", "false")]);
        assert!(!cfg.load_mcp_servers);
    }

    #[test]
    fn load_mcp_servers_requires_a_literal_true() {
        assert!(cfg_from(&[("STRANDS_LOAD_MCP_SERVERS", "TRUE")]).load_mcp_servers);
        assert!(!cfg_from(&[("STRANDS_LOAD_MCP_SERVERS", "yes")]).load_mcp_servers);
        assert!(!cfg_from(&[("STRANDS_LOAD_MCP_SERVERS", "1")]).load_mcp_servers);
        assert!(!cfg_from(&[("STRANDS_TOOLS_DIRECTORY", "enabled")]).tools_directory);
        assert!(cfg_from(&[("STRANDS_TOOLS_DIRECTORY", "true")]).tools_directory);
    }

    #[test]
    fn test_mode_marker_is_recognized() {
        assert!(cfg_from(&[("STRANDS_TEST_MODE", "1")]).test_mode);
        assert!(cfg_from(&[("PYTEST_CURRENT_TEST", "tests/x.py::t")]).test_mode);
    }

    #[test]
    fn system_prompt_appends_fenced_github_context() {
        let cfg = cfg_from(&[
            ("SYSTEM_PROMPT", "Base prompt."),
            ("GITHUB_CONTEXT", "{\"event\":\"push\"}"),
        ]);
        let prompt = cfg.system_prompt();
        assert!(prompt.starts_with("Base prompt."));
        assert!(prompt.contains("GitHub Context:\n```{\"event\":\"push\"}\n```"));
    }

    #[test]
    fn system_prompt_defaults_without_override() {
        let cfg = cfg_from(&[]);
        assert_eq!(cfg.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }
}
