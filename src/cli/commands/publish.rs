use super::{EXIT_BLOCKED, ReportFormat, ReviewOverrides, load_config};
use crate::cli::Output;
use crate::error::ShipguardError;
use crate::review::Publisher;
use crate::review::github::GitHubPublisher;
use crate::security::SecurityGate;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct PublishArgs {
    /// Revision the pull request targets (default: gate.base_ref)
    #[arg(long)]
    pub base: Option<String>,

    /// Commit message for pending edits
    #[arg(short, long, default_value = "Publish changes")]
    pub message: String,

    /// Continue into the review convergence loop after publishing
    #[arg(long)]
    pub converge: bool,

    #[command(flatten)]
    pub overrides: ReviewOverrides,

    /// Output format for the convergence report
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

pub async fn execute(args: PublishArgs, custom_config: Option<&str>, output: &Output) -> Result<i32> {
    let mut config = load_config(custom_config)?;
    if let Some(base) = args.base {
        config.gate.base_ref = base;
    }
    args.overrides.apply(&mut config.review);
    config.validate()?;

    let repo = crate::git::GitRepo::discover().context("Not inside a git repository")?;
    let workdir = repo
        .repo
        .workdir()
        .context("Bare repositories cannot be published")?
        .to_path_buf();
    drop(repo);

    let publisher = GitHubPublisher::new(
        &workdir,
        &config.review.remote,
        &config.gate.base_ref,
        SecurityGate::from_config(&config)?,
    );

    output.step("Running security gate and publishing");
    let change = match publisher.commit_and_publish(&args.message).await {
        Ok(change) => change,
        Err(ShipguardError::GateBlocked(verdict)) => {
            output.verdict(&verdict);
            return Ok(EXIT_BLOCKED);
        }
        Err(e) => return Err(e).context("Publish failed"),
    };
    output.success(&format!("Published pull request {change}"));

    if !args.converge {
        return Ok(0);
    }
    super::converge::converge(&config, change, args.format, output).await
}
