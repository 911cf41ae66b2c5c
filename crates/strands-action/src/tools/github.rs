//! GitHub operation tools backed by the `gh` CLI.
//!
//! Every operation maps to one REST call issued through `gh api`, which
//! handles authentication from the Actions-provided token. The twelve fixed
//! operations cover issue/PR CRUD, comments and reviews; `use_github` exposes
//! an arbitrary endpoint for anything the fixed set misses.

use std::process::Stdio;

use anyhow::{Context as _, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{Tool, ToolContext, opt_str, require_str};

/// One REST call: method, repo-relative or absolute path, optional JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhOperation {
    CreateIssue,
    UpdateIssue,
    AddIssueComment,
    CreatePullRequest,
    UpdatePullRequest,
    ReplyToReviewComment,
    GetIssue,
    ListIssues,
    GetIssueComments,
    GetPullRequest,
    ListPullRequests,
    GetPrReviewAndComments,
}

pub const GITHUB_OPERATIONS: [GhOperation; 12] = [
    GhOperation::CreateIssue,
    GhOperation::UpdateIssue,
    GhOperation::AddIssueComment,
    GhOperation::CreatePullRequest,
    GhOperation::UpdatePullRequest,
    GhOperation::ReplyToReviewComment,
    GhOperation::GetIssue,
    GhOperation::ListIssues,
    GhOperation::GetIssueComments,
    GhOperation::GetPullRequest,
    GhOperation::ListPullRequests,
    GhOperation::GetPrReviewAndComments,
];

impl GhOperation {
    pub fn tool_name(&self) -> &'static str {
        match self {
            GhOperation::CreateIssue => "create_issue",
            GhOperation::UpdateIssue => "update_issue",
            GhOperation::AddIssueComment => "add_issue_comment",
            GhOperation::CreatePullRequest => "create_pull_request",
            GhOperation::UpdatePullRequest => "update_pull_request",
            GhOperation::ReplyToReviewComment => "reply_to_review_comment",
            GhOperation::GetIssue => "get_issue",
            GhOperation::ListIssues => "list_issues",
            GhOperation::GetIssueComments => "get_issue_comments",
            GhOperation::GetPullRequest => "get_pull_request",
            GhOperation::ListPullRequests => "list_pull_requests",
            GhOperation::GetPrReviewAndComments => "get_pr_review_and_comments",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GhOperation::CreateIssue => "Create a new issue with a title and body",
            GhOperation::UpdateIssue => "Update an issue's title, body or state",
            GhOperation::AddIssueComment => "Add a comment to an issue or pull request",
            GhOperation::CreatePullRequest => "Open a pull request from head to base",
            GhOperation::UpdatePullRequest => "Update a pull request's title, body or state",
            GhOperation::ReplyToReviewComment => "Reply to a pull request review comment",
            GhOperation::GetIssue => "Fetch a single issue by number",
            GhOperation::ListIssues => "List issues, optionally filtered by state",
            GhOperation::GetIssueComments => "List the comments on an issue",
            GhOperation::GetPullRequest => "Fetch a single pull request by number",
            GhOperation::ListPullRequests => "List pull requests, optionally filtered by state",
            GhOperation::GetPrReviewAndComments => {
                "Fetch a pull request's reviews and review comments"
            }
        }
    }

    pub fn input_schema(&self) -> Value {
        match self {
            GhOperation::CreateIssue => object_schema(
                &[("title", "Issue title"), ("body", "Issue body")],
                &["title"],
            ),
            GhOperation::UpdateIssue => object_schema(
                &[
                    ("number", "Issue number"),
                    ("title", "New title"),
                    ("body", "New body"),
                    ("state", "open or closed"),
                ],
                &["number"],
            ),
            GhOperation::AddIssueComment => object_schema(
                &[("number", "Issue or PR number"), ("body", "Comment body")],
                &["number", "body"],
            ),
            GhOperation::CreatePullRequest => object_schema(
                &[
                    ("title", "PR title"),
                    ("body", "PR body"),
                    ("head", "Source branch"),
                    ("base", "Target branch"),
                ],
                &["title", "head", "base"],
            ),
            GhOperation::UpdatePullRequest => object_schema(
                &[
                    ("number", "PR number"),
                    ("title", "New title"),
                    ("body", "New body"),
                    ("state", "open or closed"),
                ],
                &["number"],
            ),
            GhOperation::ReplyToReviewComment => object_schema(
                &[
                    ("number", "PR number"),
                    ("comment_id", "Review comment id to reply to"),
                    ("body", "Reply body"),
                ],
                &["number", "comment_id", "body"],
            ),
            GhOperation::GetIssue | GhOperation::GetPullRequest => {
                object_schema(&[("number", "Number to fetch")], &["number"])
            }
            GhOperation::GetIssueComments | GhOperation::GetPrReviewAndComments => {
                object_schema(&[("number", "Number to inspect")], &["number"])
            }
            GhOperation::ListIssues | GhOperation::ListPullRequests => {
                object_schema(&[("state", "open, closed or all")], &[])
            }
        }
    }

    /// Map validated arguments to the REST calls to issue. Most operations
    /// need one call; review-and-comments needs two.
    pub fn plan(&self, repo: &str, args: &Value) -> anyhow::Result<Vec<GhRequest>> {
        let number = || -> anyhow::Result<u64> {
            args.get("number")
                .and_then(Value::as_u64)
                .ok_or_else(|| anyhow!("missing required argument \"number\""))
        };
        let list_query = || {
            opt_str(args, "state")
                .map(|s| format!("?state={s}"))
                .unwrap_or_default()
        };
        let requests = match self {
            GhOperation::CreateIssue => vec![GhRequest {
                method: "POST",
                path: format!("repos/{repo}/issues"),
                body: Some(json!({
                    "title": require_str(args, "title")?,
                    "body": opt_str(args, "body").unwrap_or_default(),
                })),
            }],
            GhOperation::UpdateIssue => vec![GhRequest {
                method: "PATCH",
                path: format!("repos/{repo}/issues/{}", number()?),
                body: Some(patch_body(args, &["title", "body", "state"])),
            }],
            GhOperation::AddIssueComment => vec![GhRequest {
                method: "POST",
                path: format!("repos/{repo}/issues/{}/comments", number()?),
                body: Some(json!({ "body": require_str(args, "body")? })),
            }],
            GhOperation::CreatePullRequest => vec![GhRequest {
                method: "POST",
                path: format!("repos/{repo}/pulls"),
                body: Some(json!({
                    "title": require_str(args, "title")?,
                    "body": opt_str(args, "body").unwrap_or_default(),
                    "head": require_str(args, "head")?,
                    "base": require_str(args, "base")?,
                })),
            }],
            GhOperation::UpdatePullRequest => vec![GhRequest {
                method: "PATCH",
                path: format!("repos/{repo}/pulls/{}", number()?),
                body: Some(patch_body(args, &["title", "body", "state"])),
            }],
            GhOperation::ReplyToReviewComment => {
                let comment_id = args
                    .get("comment_id")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| anyhow!("missing required argument \"comment_id\""))?;
                vec![GhRequest {
                    method: "POST",
                    path: format!(
                        "repos/{repo}/pulls/{}/comments/{comment_id}/replies",
                        number()?
                    ),
                    body: Some(json!({ "body": require_str(args, "body")? })),
                }]
            }
            GhOperation::GetIssue => vec![GhRequest {
                method: "GET",
                path: format!("repos/{repo}/issues/{}", number()?),
                body: None,
            }],
            GhOperation::ListIssues => vec![GhRequest {
                method: "GET",
                path: format!("repos/{repo}/issues{}", list_query()),
                body: None,
            }],
            GhOperation::GetIssueComments => vec![GhRequest {
                method: "GET",
                path: format!("repos/{repo}/issues/{}/comments", number()?),
                body: None,
            }],
            GhOperation::GetPullRequest => vec![GhRequest {
                method: "GET",
                path: format!("repos/{repo}/pulls/{}", number()?),
                body: None,
            }],
            GhOperation::ListPullRequests => vec![GhRequest {
                method: "GET",
                path: format!("repos/{repo}/pulls{}", list_query()),
                body: None,
            }],
            GhOperation::GetPrReviewAndComments => {
                let n = number()?;
                vec![
                    GhRequest {
                        method: "GET",
                        path: format!("repos/{repo}/pulls/{n}/reviews"),
                        body: None,
                    },
                    GhRequest {
                        method: "GET",
                        path: format!("repos/{repo}/pulls/{n}/comments"),
                        body: None,
                    },
                ]
            }
        };
        Ok(requests)
    }
}

fn object_schema(fields: &[(&str, &str)], required: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, desc)| {
            let kind = if *name == "number" || *name == "comment_id" {
                "integer"
            } else {
                "string"
            };
            (
                name.to_string(),
                json!({ "type": kind, "description": desc }),
            )
        })
        .collect();
    json!({ "type": "object", "properties": properties, "required": required })
}

/// Body containing only the optional fields that were actually supplied.
fn patch_body(args: &Value, fields: &[&str]) -> Value {
    let mut body = serde_json::Map::new();
    for field in fields {
        if let Some(v) = opt_str(args, field) {
            body.insert(field.to_string(), json!(v));
        }
    }
    Value::Object(body)
}

/// One fixed GitHub operation exposed as a tool.
pub struct GitHubTool {
    op: GhOperation,
}

impl GitHubTool {
    pub fn new(op: GhOperation) -> Self {
        GitHubTool { op }
    }
}

#[async_trait]
impl Tool for GitHubTool {
    fn name(&self) -> &str {
        self.op.tool_name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn input_schema(&self) -> Value {
        self.op.input_schema()
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let repo = ctx
            .repository
            .as_deref()
            .ok_or_else(|| anyhow!("GITHUB_REPOSITORY is not set"))?;
        let requests = self.op.plan(repo, &args)?;
        if ctx.tool_console_mode {
            info!(tool = self.op.tool_name(), "github");
        }
        let mut outputs = Vec::new();
        for request in requests {
            outputs.push(run_gh(&request).await?);
        }
        match outputs.len() {
            1 => Ok(outputs.pop().unwrap_or_default()),
            // reviews + comments travel back as one labeled object
            _ => Ok(json!({
                "reviews": parse_or_string(outputs.first()),
                "comments": parse_or_string(outputs.get(1)),
            })
            .to_string()),
        }
    }
}

/// Arbitrary GitHub REST access for endpoints the fixed tools miss.
pub struct UseGithubTool;

#[async_trait]
impl Tool for UseGithubTool {
    fn name(&self) -> &str {
        "use_github"
    }

    fn description(&self) -> &str {
        "Call an arbitrary GitHub REST endpoint, e.g. repos/{owner}/{repo}/labels"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "method": { "type": "string", "description": "HTTP method, default GET" },
                "endpoint": { "type": "string", "description": "REST path relative to the API root" },
                "body": { "type": "object", "description": "JSON request body" }
            },
            "required": ["endpoint"]
        })
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> anyhow::Result<String> {
        let endpoint = require_str(&args, "endpoint")?;
        let method = match opt_str(&args, "method").unwrap_or("GET").to_ascii_uppercase().as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PATCH" => "PATCH",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            other => bail!("unsupported HTTP method {other:?}"),
        };
        if ctx.tool_console_mode {
            info!(%method, %endpoint, "use_github");
        }
        run_gh(&GhRequest {
            method,
            path: endpoint.to_string(),
            body: args.get("body").filter(|b| b.is_object()).cloned(),
        })
        .await
    }
}

fn parse_or_string(raw: Option<&String>) -> Value {
    let raw = raw.map(String::as_str).unwrap_or_default();
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Issue one call through `gh api`; the JSON body, when present, goes in on
/// stdin via `--input -`.
async fn run_gh(request: &GhRequest) -> anyhow::Result<String> {
    let mut cmd = tokio::process::Command::new("gh");
    cmd.arg("api").arg("--method").arg(request.method).arg(&request.path);
    if request.body.is_some() {
        cmd.arg("--input").arg("-");
    }
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn().context("failed to spawn gh")?;
    if let Some(body) = &request.body {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("gh stdin unavailable"))?;
        stdin.write_all(body.to_string().as_bytes()).await?;
        drop(stdin);
    }
    let output = child.wait_with_output().await.context("gh did not run")?;
    if !output.status.success() {
        bail!(
            "gh api {} {} failed: {}",
            request.method,
            request.path,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_issue_plans_a_post_with_title_and_body() {
        let requests = GhOperation::CreateIssue
            .plan("org/repo", &json!({"title": "T", "body": "B"}))
            .unwrap();
        assert_eq!(
            requests,
            vec![GhRequest {
                method: "POST",
                path: "repos/org/repo/issues".into(),
                body: Some(json!({"title": "T", "body": "B"})),
            }]
        );
    }

    #[test]
    fn update_issue_patches_only_supplied_fields() {
        let requests = GhOperation::UpdateIssue
            .plan("org/repo", &json!({"number": 7, "state": "closed"}))
            .unwrap();
        assert_eq!(requests[0].method, "PATCH");
        assert_eq!(requests[0].path, "repos/org/repo/issues/7");
        assert_eq!(requests[0].body, Some(json!({"state": "closed"})));
    }

    #[test]
    fn list_operations_carry_the_state_filter() {
        let requests = GhOperation::ListPullRequests
            .plan("org/repo", &json!({"state": "open"}))
            .unwrap();
        assert_eq!(requests[0].path, "repos/org/repo/pulls?state=open");
        let requests = GhOperation::ListIssues.plan("org/repo", &json!({})).unwrap();
        assert_eq!(requests[0].path, "repos/org/repo/issues");
    }

    #[test]
    fn review_comment_reply_targets_the_replies_endpoint() {
        let requests = GhOperation::ReplyToReviewComment
            .plan(
                "org/repo",
                &json!({"number": 2, "comment_id": 99, "body": "thanks"}),
            )
            .unwrap();
        assert_eq!(requests[0].path, "repos/org/repo/pulls/2/comments/99/replies");
    }

    #[test]
    fn review_and_comments_plans_two_gets() {
        let requests = GhOperation::GetPrReviewAndComments
            .plan("org/repo", &json!({"number": 5}))
            .unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path, "repos/org/repo/pulls/5/reviews");
        assert_eq!(requests[1].path, "repos/org/repo/pulls/5/comments");
    }

    #[test]
    fn missing_required_arguments_are_reported() {
        let err = GhOperation::AddIssueComment
            .plan("org/repo", &json!({"number": 1}))
            .unwrap_err();
        assert!(err.to_string().contains("body"));
        let err = GhOperation::GetIssue.plan("org/repo", &json!({})).unwrap_err();
        assert!(err.to_string().contains("number"));
    }

    #[tokio::test]
    async fn fixed_tools_require_a_repository() {
        let ctx = ToolContext::for_tests();
        let err = GitHubTool::new(GhOperation::GetIssue)
            .invoke(&ctx, json!({"number": 1}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GITHUB_REPOSITORY"));
    }

    #[tokio::test]
    async fn use_github_rejects_unknown_methods() {
        let ctx = ToolContext::for_tests();
        let err = UseGithubTool
            .invoke(&ctx, json!({"endpoint": "rate_limit", "method": "BREW"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("BREW"));
    }
}
