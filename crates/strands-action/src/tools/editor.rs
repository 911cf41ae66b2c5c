//! File editing tool in the str-replace style.
//!
//! Commands: `view`, `create`, `str_replace`, `insert`. Replacement requires
//! a unique match so the model cannot silently edit the wrong occurrence.
//! Unless backups are disabled, the previous content is copied to `<path>.bak`
//! before any mutation of an existing file.

use std::path::Path;

use anyhow::{Context as _, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Tool, ToolContext, opt_str, require_str};

/// The same implementation serves two registry names, `editor` and
/// `str_replace_based_edit_tool`.
pub struct EditorTool {
    name: &'static str,
}

impl EditorTool {
    pub fn named(name: &'static str) -> Self {
        EditorTool { name }
    }
}

#[async_trait]
impl Tool for EditorTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "View, create and edit files: view, create, str_replace, insert"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["view", "create", "str_replace", "insert"]
                },
                "path": { "type": "string" },
                "file_text": { "type": "string", "description": "Content for create" },
                "old_str": { "type": "string", "description": "Unique text to replace" },
                "new_str": { "type": "string", "description": "Replacement or inserted text" },
                "insert_line": { "type": "integer", "description": "Line to insert after, 0 for top" }
            },
            "required": ["command", "path"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let command = require_str(&args, "command")?;
        let path = Path::new(require_str(&args, "path")?);
        match command {
            "view" => view(path).await,
            "create" => {
                let text = require_str(&args, "file_text")?;
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, text)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Ok(format!("created {}", path.display()))
            }
            "str_replace" => {
                let old = require_str(&args, "old_str")?;
                let new = opt_str(&args, "new_str").unwrap_or_default();
                let content = read(path).await?;
                let matches = content.matches(old).count();
                if matches == 0 {
                    bail!("old_str not found in {}", path.display());
                }
                if matches > 1 {
                    bail!(
                        "old_str matches {matches} times in {}; provide more context",
                        path.display()
                    );
                }
                backup(ctx, path, &content).await?;
                tokio::fs::write(path, content.replacen(old, new, 1)).await?;
                Ok(format!("replaced 1 occurrence in {}", path.display()))
            }
            "insert" => {
                let line = args
                    .get("insert_line")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| anyhow!("missing required argument \"insert_line\""))?
                    as usize;
                let text = require_str(&args, "new_str")?;
                let content = read(path).await?;
                let mut lines: Vec<&str> = content.lines().collect();
                if line > lines.len() {
                    bail!("insert_line {line} is past the end of {}", path.display());
                }
                lines.insert(line, text);
                let mut updated = lines.join("\n");
                if content.ends_with('\n') {
                    updated.push('\n');
                }
                backup(ctx, path, &content).await?;
                tokio::fs::write(path, updated).await?;
                Ok(format!("inserted after line {line} in {}", path.display()))
            }
            other => bail!("unknown editor command {other:?}"),
        }
    }
}

async fn read(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn view(path: &Path) -> anyhow::Result<String> {
    let content = read(path).await?;
    let numbered: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{line}", i + 1))
        .collect();
    Ok(numbered.join("\n"))
}

async fn backup(ctx: &ToolContext, path: &Path, content: &str) -> anyhow::Result<()> {
    if ctx.editor_disable_backup {
        return Ok(());
    }
    let mut bak = path.as_os_str().to_owned();
    bak.push(".bak");
    tokio::fs::write(&bak, content).await?;
    Ok(())
}
