//! Pre-push hook
//!
//! Runs the security gate before any push. Git passes the remote name and URL
//! as arguments and ref lines on stdin; the gate does not need either.

use super::HOOK_MARKER;
use crate::config::ShipguardConfig;
use crate::error::{Result, ShipguardError};
use crate::git::GitRepo;
use crate::security::{GateVerdict, SecurityGate};

pub const HOOK_NAME: &str = "pre-push";

pub fn script() -> String {
    format!(
        "#!/bin/sh\n{HOOK_MARKER}\n# Blocks the push when the security gate finds secrets.\nexec shipguard gate\n"
    )
}

/// Run the gate the way the installed hook would
pub fn execute(repo: &GitRepo, config: &ShipguardConfig) -> Result<GateVerdict> {
    let gate = SecurityGate::from_config(config)?;
    let verdict = gate.run(repo, &config.gate.base_ref)?;
    if !verdict.passed {
        return Err(ShipguardError::GateBlocked(verdict));
    }
    Ok(verdict)
}
