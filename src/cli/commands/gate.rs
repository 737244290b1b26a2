use super::{EXIT_BLOCKED, ReportFormat, load_config};
use crate::cli::Output;
use crate::git::GitRepo;
use crate::security::SecurityGate;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct GateArgs {
    /// Revision to measure the change set against (default: gate.base_ref)
    #[arg(long)]
    pub base: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

pub async fn execute(args: GateArgs, custom_config: Option<&str>, output: &Output) -> Result<i32> {
    let config = load_config(custom_config)?;
    let base = args.base.unwrap_or_else(|| config.gate.base_ref.clone());

    let repo = GitRepo::discover().context("Not inside a git repository")?;
    let gate = SecurityGate::from_config(&config)?;
    output.verbose(&format!("Scanning {base}..HEAD with {} patterns", gate.registry().len()));

    let verdict = gate
        .run(&repo, &base)
        .with_context(|| format!("Security gate failed to evaluate {base}..HEAD"))?;

    match args.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
        ReportFormat::Text => output.verdict(&verdict),
    }

    Ok(if verdict.passed { 0 } else { EXIT_BLOCKED })
}
