//! GitHub Actions step summary output.
//!
//! Appends one markdown block per run to the file named by
//! `GITHUB_STEP_SUMMARY`. Writing the summary is best-effort; the caller
//! logs failures and carries on.

use std::path::Path;

use anyhow::Context as _;

/// Inputs for one summary block.
pub struct SummaryBlock<'a> {
    pub prompt: &'a str,
    pub result: &'a str,
    pub session_id: &'a str,
    pub knowledge_base_id: Option<&'a str>,
}

/// Render the markdown block appended to the step summary.
pub fn render(block: &SummaryBlock<'_>) -> String {
    let mut out = String::new();
    out.push_str("## Agent\n\n");
    out.push_str(&format!("**Prompt:**\n```\n{}\n```\n\n", block.prompt));
    out.push_str(&format!("**Result:**\n```\n{}\n```\n\n", block.result));
    out.push_str(&format!("**Session:** `{}`\n", block.session_id));
    if let Some(kb_id) = block.knowledge_base_id {
        out.push_str(&format!("**Knowledge Base:** `{kb_id}`\n"));
    }
    out
}

/// Append the rendered block to the summary file.
pub async fn append(path: &Path, block: &SummaryBlock<'_>) -> anyhow::Result<()> {
    let existing = tokio::fs::read_to_string(path).await.unwrap_or_default();
    tokio::fs::write(path, existing + &render(block))
        .await
        .with_context(|| format!("failed to append summary to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_contains_prompt_result_and_session() {
        let rendered = render(&SummaryBlock {
            prompt: "fix issue #3",
            result: "opened PR #4",
            session_id: "gh-org-repo-42",
            knowledge_base_id: None,
        });
        assert!(rendered.starts_with("## Agent\n"));
        assert!(rendered.contains("**Prompt:**\n```\nfix issue #3\n```"));
        assert!(rendered.contains("**Result:**\n```\nopened PR #4\n```"));
        assert!(rendered.contains("**Session:** `gh-org-repo-42`"));
        assert!(!rendered.contains("Knowledge Base"));
    }

    #[test]
    fn knowledge_base_line_appears_when_configured() {
        let rendered = render(&SummaryBlock {
            prompt: "p",
            result: "r",
            session_id: "s",
            knowledge_base_id: Some("KB123"),
        });
        assert!(rendered.ends_with("**Knowledge Base:** `KB123`\n"));
    }

    #[tokio::test]
    async fn append_accumulates_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        let block = SummaryBlock {
            prompt: "p",
            result: "r",
            session_id: "s",
            knowledge_base_id: None,
        };
        append(&path, &block).await.unwrap();
        append(&path, &block).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("## Agent").count(), 2);
    }
}
