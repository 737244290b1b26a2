use crate::cli::Output;
use crate::config::{ExportFormat, ShipguardConfig};
use crate::security::PatternRegistry;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Create a shipguard config file with default settings
    Init {
        /// File format to write
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Toml)]
        format: ExportFormat,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Display current merged configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Toml)]
        format: ExportFormat,
    },
    /// Validate the merged configuration
    Validate,
}

pub async fn execute(args: ConfigArgs, custom_config: Option<&str>, output: &Output) -> Result<i32> {
    match args.command {
        ConfigCommand::Init { format, force } => {
            let path = PathBuf::from(format!("shipguard.{}", format.extension()));
            if path.exists() && !force {
                output.error(&format!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                ));
                return Ok(1);
            }
            let content = ShipguardConfig::default().export(format)?;
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output.success(&format!("Created {} with default settings", path.display()));
            Ok(0)
        }
        ConfigCommand::Show { format } => {
            let config = ShipguardConfig::load(custom_config)?;
            println!("{}", config.export(format)?);
            Ok(0)
        }
        ConfigCommand::Validate => {
            let config = ShipguardConfig::load(custom_config)?;
            match config.validate() {
                Ok(()) => {
                    output.success("Configuration is valid");
                    output.table_row(
                        "Secret patterns",
                        &PatternRegistry::from_config(&config.gate)?.len().to_string(),
                    );
                    output.table_row("Base ref", &config.gate.base_ref);
                    output.table_row("Max iterations", &config.review.max_iterations.to_string());
                    output.table_row(
                        "Poll",
                        &format!(
                            "{} x {}s",
                            config.review.max_poll_attempts, config.review.poll_interval_secs
                        ),
                    );
                    output.table_row(
                        "Fix command",
                        config.review.fix_command.as_deref().unwrap_or("(none)"),
                    );
                    Ok(0)
                }
                Err(e) => {
                    output.error(&format!("Configuration is invalid: {e:#}"));
                    Ok(1)
                }
            }
        }
    }
}
