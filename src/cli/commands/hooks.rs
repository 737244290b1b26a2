//! Git hooks command implementations

use super::{EXIT_BLOCKED, load_config};
use crate::cli::Output;
use crate::error::ShipguardError;
use crate::git::GitRepo;
use crate::hooks::{self, pre_push};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct HooksArgs {
    #[command(subcommand)]
    pub command: HooksCommand,
}

#[derive(Subcommand)]
pub enum HooksCommand {
    /// Install the pre-push gate hook
    Install {
        /// Replace an existing hook not written by shipguard
        #[arg(short, long)]
        force: bool,
    },
    /// Remove the pre-push gate hook
    Remove,
    /// Run a hook manually
    Run {
        /// Hook name to run
        hook: String,
    },
}

pub async fn execute(args: HooksArgs, custom_config: Option<&str>, output: &Output) -> Result<i32> {
    let repo = GitRepo::discover().context("Not inside a git repository")?;

    match args.command {
        HooksCommand::Install { force } => {
            let path = hooks::install(&repo, pre_push::HOOK_NAME, force)?;
            output.success(&format!("Installed {} hook", pre_push::HOOK_NAME));
            output.table_row("Path", &path.display().to_string());
            Ok(0)
        }
        HooksCommand::Remove => {
            if hooks::remove(&repo, pre_push::HOOK_NAME)? {
                output.success(&format!("Removed {} hook", pre_push::HOOK_NAME));
            } else {
                output.info(&format!("No shipguard {} hook installed", pre_push::HOOK_NAME));
            }
            Ok(0)
        }
        HooksCommand::Run { hook } => {
            if hook != pre_push::HOOK_NAME {
                anyhow::bail!(
                    "Unsupported hook '{}' (supported: {})",
                    hook,
                    hooks::SUPPORTED_HOOKS.join(", ")
                );
            }
            let config = load_config(custom_config)?;
            match pre_push::execute(&repo, &config) {
                Ok(verdict) => {
                    output.verdict(&verdict);
                    Ok(0)
                }
                Err(ShipguardError::GateBlocked(verdict)) => {
                    output.verdict(&verdict);
                    Ok(EXIT_BLOCKED)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}
