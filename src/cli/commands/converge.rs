use super::{ReportFormat, ReviewOverrides, load_config};
use crate::cli::Output;
use crate::config::ShipguardConfig;
use crate::git::GitRepo;
use crate::review::artifacts::ArtifactStore;
use crate::review::fixer::CommandFixApplier;
use crate::review::github::{GhCli, GitHubCommentSource, GitHubPublisher};
use crate::review::{ChangeId, ConvergenceController, ConvergenceReport};
use crate::security::SecurityGate;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct ConvergeArgs {
    /// Pull request number to converge
    #[arg(long)]
    pub pr: u64,

    #[command(flatten)]
    pub overrides: ReviewOverrides,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

pub async fn execute(
    args: ConvergeArgs,
    custom_config: Option<&str>,
    output: &Output,
) -> Result<i32> {
    let mut config = load_config(custom_config)?;
    args.overrides.apply(&mut config.review);
    config.validate()?;

    converge(&config, ChangeId(args.pr), args.format, output).await
}

fn workdir() -> Result<PathBuf> {
    let repo = GitRepo::discover().context("Not inside a git repository")?;
    repo.repo
        .workdir()
        .map(PathBuf::from)
        .context("Bare repositories cannot be converged")
}

/// Run the convergence loop on `change`; shared with `publish --converge`
pub(crate) async fn converge(
    config: &ShipguardConfig,
    change: ChangeId,
    format: ReportFormat,
    output: &Output,
) -> Result<i32> {
    let workdir = workdir()?;
    let gh = GhCli::new(&workdir);
    gh.ensure_ready().await?;

    let artifacts = ArtifactStore::new(workdir.join(&config.review.feedback_dir));
    let source = GitHubCommentSource::new(gh);
    let applier = CommandFixApplier::new(
        config.review.fix_command.clone(),
        workdir.clone(),
        artifacts.clone(),
    );
    let publisher = GitHubPublisher::new(
        &workdir,
        &config.review.remote,
        &config.gate.base_ref,
        SecurityGate::from_config(config)?,
    );
    let controller = ConvergenceController::new(&source, &applier, &publisher, &config.review)?
        .with_artifacts(artifacts);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current poll attempt");
            on_interrupt.cancel();
        }
    });

    output.info(&format!(
        "Converging {} (max {} iteration(s), polling every {}s up to {} times)",
        change,
        config.review.max_iterations,
        config.review.poll_interval_secs,
        config.review.max_poll_attempts
    ));

    match controller.run(change, &cancel).await {
        Ok(report) => {
            render(&report, format, output)?;
            Ok(report.exit_code())
        }
        Err(failure) => {
            render(&failure.report, format, output)?;
            if let crate::error::ShipguardError::GateBlocked(verdict) = &failure.error {
                output.verdict(verdict);
                return Ok(super::EXIT_BLOCKED);
            }
            Err(failure.error).context("Convergence stopped on a hard failure")
        }
    }
}

fn render(report: &ConvergenceReport, format: ReportFormat, output: &Output) -> Result<()> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        ReportFormat::Text => output.convergence(report),
    }
    Ok(())
}
