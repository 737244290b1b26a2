use thiserror::Error;

use crate::security::GateVerdict;

#[derive(Debug, Error)]
pub enum ShipguardError {
    /// A collaborator (git, gh, fix command) is missing, unauthenticated or misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid secret pattern '{label}': {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid glob '{glob}': {source}")]
    InvalidGlob {
        glob: String,
        #[source]
        source: globset::Error,
    },

    #[error("security gate blocked publish with {} finding(s)", .0.findings.len())]
    GateBlocked(GateVerdict),

    /// Publish failed for a reason unrelated to content (conflict, rejected push, API failure).
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("external command failed: {command}: {stderr}")]
    Command { command: String, stderr: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ShipguardError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ShipguardError>;
