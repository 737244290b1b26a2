//! Command-line interface for Shipguard
//!
//! Argument parsing lives in [`commands`]; every subcommand returns the
//! process exit code it wants so gate and convergence outcomes stay
//! distinguishable to scripts.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
