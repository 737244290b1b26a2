//! Security features for Shipguard
//!
//! This module provides the pre-publish secret gate: the pattern registry, the
//! diff-based secret scanner, the hardcoded credential heuristic, the ignore-file
//! auditor and the gate that composes them into one verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gate;
pub mod heuristic;
pub mod ignore_file;
pub mod patterns;
pub mod scanner;


pub use gate::SecurityGate;
pub use heuristic::CredentialHeuristic;
pub use ignore_file::IgnoreListAuditor;
pub use patterns::{PatternRegistry, SecretPattern};
pub use scanner::SecretScanner;

/// What kind of check produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// A registered secret signature matched added content
    Secret,
    /// The assignment-shaped heuristic matched added content
    HardcodedCredential,
    /// An environment file is staged for commit
    EnvFile,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::Secret => write!(f, "SECRET"),
            FindingKind::HardcodedCredential => write!(f, "CREDENTIAL"),
            FindingKind::EnvFile => write!(f, "ENV FILE"),
        }
    }
}

/// A single reported violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// Label of the signature (or check) that fired
    pub pattern_label: String,

    /// Redacted excerpt of the offending text
    pub excerpt: String,

    /// File the finding belongs to
    pub file_path: String,

    /// New-side line number (1-based), when the finding comes from diff content
    pub line_number: Option<usize>,

    pub kind: FindingKind,
}

/// Pass/fail result of a gate invocation.
///
/// `passed` is derived from the findings, so a passing verdict never carries findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub passed: bool,
    pub findings: Vec<ScanFinding>,
}

impl GateVerdict {
    pub fn from_findings(findings: Vec<ScanFinding>) -> Self {
        Self {
            passed: findings.is_empty(),
            findings,
        }
    }

    pub fn pass() -> Self {
        Self::from_findings(Vec::new())
    }

    /// Count findings of one kind
    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }
}

/// Mask a matched secret, keeping a short prefix so the user can locate it.
pub fn redact(matched: &str) -> String {
    const VISIBLE: usize = 4;
    const MASK_WIDTH: usize = 8;

    let chars: Vec<char> = matched.chars().collect();
    if chars.len() <= 2 * VISIBLE {
        return "*".repeat(MASK_WIDTH);
    }
    let prefix: String = chars[..VISIBLE].iter().collect();
    format!("{}{}", prefix, "*".repeat(MASK_WIDTH))
}
