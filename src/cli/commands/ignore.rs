use super::load_config;
use crate::cli::Output;
use crate::git::GitRepo;
use crate::security::IgnoreListAuditor;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct IgnoreArgs {
    /// Report missing entries without writing them
    #[arg(long)]
    pub check: bool,
}

pub async fn execute(args: IgnoreArgs, custom_config: Option<&str>, output: &Output) -> Result<i32> {
    let config = load_config(custom_config)?;
    let repo = GitRepo::discover().context("Not inside a git repository")?;
    let workdir = repo
        .repo
        .workdir()
        .context("Bare repositories have no ignore file")?;
    let path = workdir.join(&config.gate.ignore_file);

    let auditor = IgnoreListAuditor::new(config.required_ignores());

    if args.check {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        let missing = auditor.missing(&content);
        if missing.is_empty() {
            output.success(&format!("{} lists every required entry", path.display()));
            return Ok(0);
        }
        output.warning(&format!("{} is missing {} entr(ies)", path.display(), missing.len()));
        for entry in missing {
            output.list_item(entry);
        }
        return Ok(1);
    }

    let appended = auditor
        .ensure(&path)
        .with_context(|| format!("Failed to update {}", path.display()))?;
    if appended.is_empty() {
        output.success(&format!("{} already lists every required entry", path.display()));
    } else {
        output.success(&format!("Added {} entr(ies) to {}", appended.len(), path.display()));
        for entry in &appended {
            output.list_item(entry);
        }
    }
    Ok(0)
}
