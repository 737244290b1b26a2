//! # Shipguard - Pre-publish secret gate and review convergence loop
//!
//! Shipguard sits between a local change set and its pull request:
//!
//! - **Security gate**: before anything is published, the pending diff is
//!   scanned for known secret signatures and credential-shaped assignments,
//!   staged environment files are refused, and the ignore file is kept
//!   listing sensitive paths.
//! - **Review convergence**: once published, reviewer-bot comments are polled,
//!   classified and handed to an external fix command, and the result is
//!   re-published, until the review is clean or the loop detects it cannot
//!   make progress.
//!
//! ## Quick Start
//!
//! ```bash
//! # Gate the current branch against origin/main
//! shipguard gate
//!
//! # Publish and iterate on review feedback
//! shipguard publish --converge
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod hooks;
pub mod review;
pub mod security;

pub use cli::{Cli, Output};
pub use config::ShipguardConfig;
pub use error::{Result, ShipguardError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
