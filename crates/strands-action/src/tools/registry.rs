//! Static tool registry.
//!
//! The `STRANDS_TOOLS` string uses the grammar `pkg:a,b;pkg2:c`. Package and
//! tool names resolve through a compile-time mapping; unknown identifiers get
//! a descriptive error. The config parser skips malformed groups and
//! unresolvable names individually, keeping everything that did resolve.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::ToolHandle;
use super::editor::EditorTool;
use super::github::{GITHUB_OPERATIONS, GitHubTool, UseGithubTool};
use super::handoff::HandoffTool;
use super::kb::{RetrieveTool, StoreInKbTool};
use super::notebook::NotebookTool;
use super::shell::ShellTool;
use super::subagent::{CreateSubagentTool, SystemPromptTool, UseAgentTool};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown tool package {package:?}")]
    UnknownPackage { package: String },
    #[error("unknown tool {name:?} in package {package:?}")]
    UnknownTool { package: String, name: String },
}

/// Resolve a single `package:name` pair to a tool instance.
pub fn resolve(package: &str, name: &str) -> Result<ToolHandle, ResolveError> {
    let tool: Option<ToolHandle> = match package {
        "strands_tools" => match name {
            "shell" => Some(Arc::new(ShellTool)),
            "editor" => Some(Arc::new(EditorTool::named("editor"))),
            "retrieve" => Some(Arc::new(RetrieveTool)),
            "use_agent" => Some(Arc::new(UseAgentTool)),
            "handoff_to_user" => Some(Arc::new(HandoffTool)),
            "notebook" => Some(Arc::new(NotebookTool)),
            _ => None,
        },
        "strands_action" => match name {
            "use_github" => Some(Arc::new(UseGithubTool)),
            "system_prompt" => Some(Arc::new(SystemPromptTool)),
            "store_in_kb" => Some(Arc::new(StoreInKbTool)),
            "create_subagent" => Some(Arc::new(CreateSubagentTool)),
            _ => None,
        },
        "github_tools" => GITHUB_OPERATIONS
            .iter()
            .find(|op| op.tool_name() == name)
            .map(|op| Arc::new(GitHubTool::new(*op)) as ToolHandle),
        _ => {
            return Err(ResolveError::UnknownPackage {
                package: package.to_string(),
            });
        }
    };
    tool.ok_or_else(|| ResolveError::UnknownTool {
        package: package.to_string(),
        name: name.to_string(),
    })
}

/// Parse the tool config string, resolving each entry. Malformed groups and
/// unresolvable names are logged and skipped; order and duplicates are kept.
pub fn parse_tools_config(config: &str) -> Vec<ToolHandle> {
    let mut tools = Vec::new();
    for group in config.split(';') {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        let Some((package, names)) = group.split_once(':') else {
            warn!(%group, "skipping malformed tool group (missing colon)");
            continue;
        };
        let package = package.trim();
        for name in names.split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match resolve(package, name) {
                Ok(tool) => tools.push(tool),
                Err(error) => warn!(%error, "skipping unresolvable tool"),
            }
        }
    }
    info!(tool_count = tools.len(), "resolved configured tools");
    tools
}

/// The fixed set of GitHub operation tools (issue/PR CRUD, comments, reviews).
pub fn github_bundle() -> Vec<ToolHandle> {
    GITHUB_OPERATIONS
        .iter()
        .map(|op| Arc::new(GitHubTool::new(*op)) as ToolHandle)
        .collect()
}

/// The fixed auxiliary tools: human handoff, notebook, file editing.
pub fn aux_bundle() -> Vec<ToolHandle> {
    vec![
        Arc::new(HandoffTool),
        Arc::new(NotebookTool),
        Arc::new(EditorTool::named("str_replace_based_edit_tool")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TOOLS;
    use proptest::prelude::*;

    #[test]
    fn default_config_resolves_fully() {
        let tools = parse_tools_config(DEFAULT_TOOLS);
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "shell",
                "retrieve",
                "use_agent",
                "use_github",
                "system_prompt",
                "store_in_kb",
                "create_subagent",
            ]
        );
    }

    #[test]
    fn malformed_group_is_skipped_but_others_survive() {
        let tools = parse_tools_config("no-colon-here;strands_tools:shell");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "shell");
    }

    #[test]
    fn unresolvable_names_are_skipped_individually() {
        let tools = parse_tools_config("strands_tools:shell,nope,retrieve;ghost:x");
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["shell", "retrieve"]);
    }

    #[test]
    fn unknown_identifiers_get_descriptive_errors() {
        assert_eq!(
            resolve("ghost", "shell").err(),
            Some(ResolveError::UnknownPackage {
                package: "ghost".into()
            })
        );
        assert_eq!(
            resolve("strands_tools", "teleport").err(),
            Some(ResolveError::UnknownTool {
                package: "strands_tools".into(),
                name: "teleport".into()
            })
        );
    }

    #[test]
    fn duplicates_are_permitted_in_order() {
        let tools = parse_tools_config("strands_tools:shell;strands_tools:shell");
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn github_bundle_has_all_twelve_operations() {
        let tools = github_bundle();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), 12);
        assert!(names.contains(&"create_issue"));
        assert!(names.contains(&"get_pr_review_and_comments"));
    }

    #[test]
    fn aux_bundle_has_fixed_names() {
        let tools = aux_bundle();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec!["handoff_to_user", "notebook", "str_replace_based_edit_tool"]
        );
    }

    proptest! {
        #[test]
        fn parser_never_panics_on_arbitrary_input(config in ".{0,256}") {
            let _ = parse_tools_config(&config);
        }
    }
}
