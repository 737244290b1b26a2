//! Security gate
//!
//! The single pass/fail checkpoint run before any publish. Fixed order:
//! ignore-file audit (never blocks), staged environment-file check (blocks
//! immediately), secret scanner, credential heuristic. Both scanners always run
//! and their findings are aggregated into one verdict.

use super::heuristic::CredentialHeuristic;
use super::ignore_file::IgnoreListAuditor;
use super::patterns::PatternRegistry;
use super::scanner::SecretScanner;
use super::{FindingKind, GateVerdict, ScanFinding};
use crate::config::ShipguardConfig;
use crate::error::{Result, ShipguardError};
use crate::git::VersionControl;
use crate::git::diff::DiffExtractor;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

pub const ENV_FILE_LABEL: &str = "Environment File";

pub struct SecurityGate {
    auditor: IgnoreListAuditor,
    ignore_file: String,
    env_files: GlobSet,
    extractor: DiffExtractor,
    scanner: SecretScanner,
    heuristic: CredentialHeuristic,
    scan_staged: bool,
}

impl SecurityGate {
    pub fn from_config(config: &ShipguardConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.gate.env_file_patterns {
            let glob = Glob::new(pattern).map_err(|source| ShipguardError::InvalidGlob {
                glob: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let env_files = builder
            .build()
            .map_err(|source| ShipguardError::InvalidGlob {
                glob: config.gate.env_file_patterns.join(","),
                source,
            })?;

        Ok(Self {
            auditor: IgnoreListAuditor::new(config.required_ignores()),
            ignore_file: config.gate.ignore_file.clone(),
            env_files,
            extractor: DiffExtractor::new(&config.gate.exclusions)?,
            scanner: SecretScanner::new(PatternRegistry::from_config(&config.gate)?),
            heuristic: CredentialHeuristic::from_config(&config.heuristic)?,
            scan_staged: config.gate.scan_staged,
        })
    }

    pub fn registry(&self) -> &PatternRegistry {
        self.scanner.registry()
    }

    /// Run the gate against the change set `base_ref..HEAD` (plus staged content).
    ///
    /// Precondition: the caller has exclusive access to the pending change set.
    /// Nothing may alter staged content between this verdict and the publish it
    /// guards, otherwise the verdict is stale.
    pub fn run(&self, vcs: &dyn VersionControl, base_ref: &str) -> Result<GateVerdict> {
        self.audit(vcs);

        let staged = vcs.staged_files()?;
        let env_findings = self.check_env_files(&staged);
        if !env_findings.is_empty() {
            tracing::warn!("Environment file staged; skipping content scans");
            return Ok(GateVerdict::from_findings(env_findings));
        }

        let mut diff_text = self.extractor.extract(vcs, base_ref, "HEAD")?;
        if self.scan_staged {
            diff_text.push_str(&self.extractor.extract_staged(vcs)?);
        }

        let verdict = self.evaluate_diff(&diff_text);
        tracing::info!(
            "Security gate {}: {} secret(s), {} hardcoded credential(s)",
            if verdict.passed { "passed" } else { "blocked" },
            verdict.count(FindingKind::Secret),
            verdict.count(FindingKind::HardcodedCredential)
        );
        Ok(verdict)
    }

    /// Apply both content scanners to already-extracted diff text
    pub fn evaluate_diff(&self, diff_text: &str) -> GateVerdict {
        let filtered = self.extractor.filter(diff_text);
        let mut findings = self.scanner.scan(&filtered).findings;
        findings.extend(self.heuristic.scan(&filtered).findings);
        GateVerdict::from_findings(findings)
    }

    /// Staged paths that look like environment files (template files excepted)
    pub fn check_env_files(&self, staged: &[String]) -> Vec<ScanFinding> {
        staged
            .iter()
            .filter(|path| {
                let name = Path::new(path.as_str())
                    .file_name()
                    .map(Path::new)
                    .unwrap_or_else(|| Path::new(path.as_str()));
                self.env_files.is_match(name) && !self.extractor.is_excluded(path)
            })
            .map(|path| ScanFinding {
                pattern_label: ENV_FILE_LABEL.to_string(),
                excerpt: String::new(),
                file_path: path.clone(),
                line_number: None,
                kind: FindingKind::EnvFile,
            })
            .collect()
    }

    /// Complete the ignore file. Never blocks; failures are logged.
    ///
    /// Publishers call this before staging the work tree so that newly ignored
    /// environment files never reach the index.
    pub fn audit(&self, vcs: &dyn VersionControl) {
        let Some(workdir) = vcs.workdir() else {
            tracing::warn!("Bare repository; skipping ignore-file audit");
            return;
        };
        let path = workdir.join(&self.ignore_file);
        if let Err(e) = self.auditor.ensure(&path) {
            tracing::warn!("Could not audit {}: {}", path.display(), e);
        }
    }
}
