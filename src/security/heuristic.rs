//! Hardcoded credential heuristic
//!
//! Broad match first: a credential-sounding key assigned an opaque value of at
//! least `min_value_length` characters. Quoted values may hold any punctuation;
//! unquoted ones stop at the first character outside the base64/identifier set. Then suppress any match whose line carries
//! a placeholder marker. This trades some recall for quiet docs and templates.

use super::{FindingKind, GateVerdict, ScanFinding, redact};
use crate::config::HeuristicConfig;
use crate::error::{Result, ShipguardError};
use crate::git::diff::added_lines;
use regex::Regex;

pub const HEURISTIC_LABEL: &str = "Hardcoded Credential";

pub struct CredentialHeuristic {
    expression: Regex,
    suppression_markers: Vec<String>,
}

impl CredentialHeuristic {
    pub fn from_config(config: &HeuristicConfig) -> Result<Self> {
        let stems = config
            .key_stems
            .iter()
            .map(|stem| regex::escape(stem))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r#"(?i)[A-Za-z0-9_.-]*(?:{stems})[A-Za-z0-9_.-]*["']?\s*(?::=|=>|=|:)\s*(?:["']([^"'\s]{{{min},}})["']|([A-Za-z0-9+/=_.\-]{{{min},}}))"#,
            min = config.min_value_length,
        );
        let expression = Regex::new(&pattern).map_err(|source| ShipguardError::InvalidPattern {
            label: HEURISTIC_LABEL.to_string(),
            source,
        })?;

        Ok(Self {
            expression,
            suppression_markers: config
                .suppression_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        })
    }

    /// Whether the line carries a placeholder marker
    pub fn is_suppressed(&self, line: &str) -> bool {
        let lowered = line.to_lowercase();
        self.suppression_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
    }

    /// Opaque values assigned to credential-shaped keys on one line, before suppression
    pub fn candidates<'a>(&self, line: &'a str) -> Vec<&'a str> {
        self.expression
            .captures_iter(line)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()))
            .collect()
    }

    pub fn scan(&self, diff_text: &str) -> GateVerdict {
        let mut findings = Vec::new();
        let mut suppressed = 0usize;

        for line in added_lines(diff_text) {
            let candidates = self.candidates(&line.content);
            if candidates.is_empty() {
                continue;
            }
            if self.is_suppressed(&line.content) {
                suppressed += candidates.len();
                continue;
            }
            for value in candidates {
                findings.push(ScanFinding {
                    pattern_label: HEURISTIC_LABEL.to_string(),
                    excerpt: redact(value),
                    file_path: line.file_path.clone(),
                    line_number: Some(line.line_number),
                    kind: FindingKind::HardcodedCredential,
                });
            }
        }

        tracing::debug!(
            "Credential heuristic produced {} finding(s), suppressed {}",
            findings.len(),
            suppressed
        );
        GateVerdict::from_findings(findings)
    }
}
