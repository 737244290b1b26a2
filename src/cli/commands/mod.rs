use crate::cli::Output;
use crate::config::{ReviewConfig, ShipguardConfig};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod config;
pub mod converge;
pub mod gate;
pub mod hooks;
pub mod ignore;
pub mod patterns;
pub mod publish;

/// Exit code when the security gate blocks
pub const EXIT_BLOCKED: i32 = 1;

#[derive(Parser)]
#[command(
    name = "shipguard",
    version = crate::VERSION,
    about = "Pre-publish secret gate and review-feedback convergence loop",
    long_about = "Shipguard blocks a publish when the pending change set leaks secrets, \
                  then drives reviewer-bot feedback on the pull request to a clean state \
                  with bounded, loop-aware iterations."
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<String>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the security gate against the pending change set
    Gate(gate::GateArgs),
    /// Gate, commit, push and open (or update) the pull request
    Publish(publish::PublishArgs),
    /// Iterate on reviewer feedback until it converges
    Converge(converge::ConvergeArgs),
    /// List secret patterns in evaluation order
    Patterns(patterns::PatternsArgs),
    /// Add missing sensitive entries to the ignore file
    Ignore(ignore::IgnoreArgs),
    /// Git hook management
    Hooks(hooks::HooksArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Per-run overrides of the review loop parameters
#[derive(Args, Debug, Default, Clone)]
pub struct ReviewOverrides {
    /// Maximum fix iterations before giving up
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Seconds between poll attempts
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Poll attempts per iteration
    #[arg(long)]
    pub attempts: Option<u32>,
}

impl ReviewOverrides {
    pub fn apply(&self, review: &mut ReviewConfig) {
        if let Some(max) = self.max_iterations {
            review.max_iterations = max;
        }
        if let Some(interval) = self.interval {
            review.poll_interval_secs = interval;
        }
        if let Some(attempts) = self.attempts {
            review.max_poll_attempts = attempts;
        }
    }
}

impl Cli {
    /// Execute the command and return the process exit code
    pub async fn run(self) -> Result<i32> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("Cannot change directory to {dir}"))?;
        }

        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);
        let custom_config = self.config.as_deref();

        match self.command {
            Some(Commands::Gate(args)) => gate::execute(args, custom_config, &output).await,
            Some(Commands::Publish(args)) => publish::execute(args, custom_config, &output).await,
            Some(Commands::Converge(args)) => converge::execute(args, custom_config, &output).await,
            Some(Commands::Patterns(args)) => patterns::execute(args, custom_config, &output).await,
            Some(Commands::Ignore(args)) => ignore::execute(args, custom_config, &output).await,
            Some(Commands::Hooks(args)) => hooks::execute(args, custom_config, &output).await,
            Some(Commands::Config(args)) => config::execute(args, custom_config, &output).await,
            None => {
                println!("Run 'shipguard --help' for usage information");
                Ok(0)
            }
        }
    }
}

/// Load and validate layered configuration
pub(crate) fn load_config(custom_config: Option<&str>) -> Result<ShipguardConfig> {
    let config = ShipguardConfig::load(custom_config)?;
    config.validate().context("Invalid shipguard configuration")?;
    Ok(config)
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
