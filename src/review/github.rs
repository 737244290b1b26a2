//! GitHub collaborators backed by the `git` and `gh` executables
//!
//! Comments come from `gh api --paginate`; publishing is the ignore-file audit,
//! `git add`, the security gate, `git commit`, `git push` and a find-or-create of
//! the pull request. Missing executables or an unauthenticated `gh` are configuration
//! errors.

use super::{ChangeId, CommentSource, Publisher, ReviewComment};
use crate::error::{Result, ShipguardError};
use crate::git::GitRepo;
use crate::security::SecurityGate;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;

/// Runs `git` and `gh` inside one working tree
#[derive(Debug, Clone)]
pub struct GhCli {
    workdir: PathBuf,
}

impl GhCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Both executables present and `gh` authenticated
    pub async fn ensure_ready(&self) -> Result<()> {
        for program in ["git", "gh"] {
            if which::which(program).is_err() {
                return Err(ShipguardError::configuration(format!(
                    "`{program}` was not found in PATH"
                )));
            }
        }

        let output = self.run("gh", &["auth", "status"]).await?;
        if !output.status.success() {
            return Err(ShipguardError::configuration(format!(
                "gh is not authenticated: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        tracing::debug!("Running {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await?;

        if !output.status.success() {
            tracing::debug!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output)
    }

    /// Run and return trimmed stdout, failing on a non-zero exit
    async fn run_checked(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = self.run(program, args).await?;
        if !output.status.success() {
            return Err(ShipguardError::Command {
                command: format!("{} {}", program, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

/// Shared shape of pull-request review comments and issue comments
#[derive(Debug, Deserialize)]
struct ApiComment {
    id: u64,
    user: Option<ApiUser>,
    path: Option<String>,
    line: Option<u32>,
    original_line: Option<u32>,
    #[serde(default)]
    body: String,
    created_at: String,
    html_url: String,
}

impl From<ApiComment> for ReviewComment {
    fn from(api: ApiComment) -> Self {
        ReviewComment {
            id: api.id,
            author: api.user.map(|u| u.login).unwrap_or_default(),
            line: api.line.or(api.original_line),
            file_path: api.path,
            body: api.body,
            timestamp: api.created_at,
            url: api.html_url,
        }
    }
}

/// `gh api --paginate` prints one JSON array per page, back to back
fn parse_comment_pages(text: &str) -> Result<Vec<ReviewComment>> {
    let mut comments = Vec::new();
    for page in serde_json::Deserializer::from_str(text).into_iter::<Vec<ApiComment>>() {
        comments.extend(page?.into_iter().map(ReviewComment::from));
    }
    Ok(comments)
}

pub struct GitHubCommentSource {
    gh: GhCli,
}

impl GitHubCommentSource {
    pub fn new(gh: GhCli) -> Self {
        Self { gh }
    }
}

#[async_trait]
impl CommentSource for GitHubCommentSource {
    async fn fetch(&self, change: ChangeId) -> Result<Vec<ReviewComment>> {
        let mut comments = Vec::new();
        for endpoint in [
            format!("repos/{{owner}}/{{repo}}/pulls/{}/comments", change.0),
            format!("repos/{{owner}}/{{repo}}/issues/{}/comments", change.0),
        ] {
            let text = self
                .gh
                .run_checked("gh", &["api", "--paginate", endpoint.as_str()])
                .await
                .map_err(|e| match e {
                    ShipguardError::Command { stderr, .. } => ShipguardError::configuration(
                        format!("cannot read comments for {change}: {stderr}"),
                    ),
                    other => other,
                })?;
            comments.extend(parse_comment_pages(&text)?);
        }
        comments.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(comments)
    }
}

/// Publishes through the security gate; there is no way around it
pub struct GitHubPublisher {
    gh: GhCli,
    workdir: PathBuf,
    remote: String,
    base_ref: String,
    gate: SecurityGate,
}

impl GitHubPublisher {
    pub fn new(
        workdir: impl Into<PathBuf>,
        remote: impl Into<String>,
        base_ref: impl Into<String>,
        gate: SecurityGate,
    ) -> Self {
        let workdir = workdir.into();
        Self {
            gh: GhCli::new(workdir.clone()),
            workdir,
            remote: remote.into(),
            base_ref: base_ref.into(),
            gate,
        }
    }

    /// Audit the ignore file, stage the work tree, then gate what was staged.
    ///
    /// Returns the current branch.
    async fn stage_and_gate(&self) -> Result<String> {
        self.gate.audit(&GitRepo::open(&self.workdir)?);

        self.gh
            .run_checked("git", &["add", "-A"])
            .await
            .map_err(|e| ShipguardError::Publish(e.to_string()))?;

        let repo = GitRepo::open(&self.workdir)?;
        let verdict = self.gate.run(&repo, &self.base_ref)?;
        if !verdict.passed {
            return Err(ShipguardError::GateBlocked(verdict));
        }
        repo.current_branch()
    }

    async fn commit(&self, message: &str) -> Result<bool> {
        let output = self.gh.run("git", &["commit", "-m", message]).await?;
        if output.status.success() {
            return Ok(true);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("nothing to commit") || stderr.contains("nothing to commit") {
            tracing::info!("Nothing to commit; publishing existing history");
            return Ok(false);
        }
        Err(ShipguardError::Publish(format!(
            "git commit failed: {}",
            stderr.trim()
        )))
    }

    async fn find_pull_request(&self) -> Result<Option<ChangeId>> {
        let output = self
            .gh
            .run("gh", &["pr", "view", "--json", "number", "-q", ".number"])
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .ok()
            .map(ChangeId))
    }
}

/// Branch name a pull request should target, without the remote prefix
fn base_branch<'a>(base_ref: &'a str, remote: &str) -> &'a str {
    base_ref
        .strip_prefix(remote)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(base_ref)
}

/// `gh pr create` prints the new pull request URL
fn pr_number_from_url(url: &str) -> Option<u64> {
    url.trim().trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl Publisher for GitHubPublisher {
    async fn commit_and_publish(&self, message: &str) -> Result<ChangeId> {
        self.gh.ensure_ready().await?;

        let branch = self.stage_and_gate().await?;
        self.commit(message).await?;

        self.gh
            .run_checked("git", &["push", "-u", self.remote.as_str(), branch.as_str()])
            .await
            .map_err(|e| ShipguardError::Publish(e.to_string()))?;
        tracing::info!("Pushed {} to {}", branch, self.remote);

        if let Some(change) = self.find_pull_request().await? {
            tracing::info!("Updated pull request {}", change);
            return Ok(change);
        }

        let base = base_branch(&self.base_ref, &self.remote);
        let url = self
            .gh
            .run_checked(
                "gh",
                &["pr", "create", "--fill", "--base", base, "--head", branch.as_str()],
            )
            .await
            .map_err(|e| ShipguardError::Publish(e.to_string()))?;

        let change = match pr_number_from_url(&url) {
            Some(number) => ChangeId(number),
            None => self.find_pull_request().await?.ok_or_else(|| {
                ShipguardError::Publish(format!("could not determine pull request from '{url}'"))
            })?,
        };
        tracing::info!("Created pull request {} ({})", change, url);
        Ok(change)
    }
}
