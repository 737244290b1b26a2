use super::load_config;
use crate::cli::Output;
use crate::security::PatternRegistry;
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct PatternsArgs {
    /// Show the regular expression for each pattern
    #[arg(long)]
    pub regex: bool,
}

pub async fn execute(args: PatternsArgs, custom_config: Option<&str>, output: &Output) -> Result<i32> {
    let config = load_config(custom_config)?;
    let registry = PatternRegistry::from_config(&config.gate)?;

    output.header(&format!("Secret patterns ({})", registry.len()));
    for (index, pattern) in registry.patterns().iter().enumerate() {
        if args.regex {
            println!("{:>3}. {:<32} {}", index + 1, pattern.label, pattern.regex.as_str());
        } else {
            println!("{:>3}. {}", index + 1, pattern.label);
        }
    }
    Ok(0)
}
