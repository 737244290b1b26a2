//! Unified diff handling
//!
//! The extractor removes excluded files from a diff and turns what is left into
//! added lines with their file path and new-side line number. Scanners only ever
//! see added lines, so unchanged context can't trigger findings.

use crate::error::{Result, ShipguardError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use super::VersionControl;

lazy_static! {
    static ref HUNK_HEADER: Regex =
        Regex::new(r"^@@ -\d+(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static hunk regex");
}

/// A line introduced by the change set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub file_path: String,
    pub line_number: usize,
    pub content: String,
}

/// Computes the scannable change set between two revisions
pub struct DiffExtractor {
    exclusions: GlobSet,
}

impl DiffExtractor {
    pub fn new(exclusions: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclusions {
            let glob = Glob::new(pattern).map_err(|source| ShipguardError::InvalidGlob {
                glob: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let exclusions = builder
            .build()
            .map_err(|source| ShipguardError::InvalidGlob {
                glob: exclusions.join(","),
                source,
            })?;

        Ok(Self { exclusions })
    }

    /// Whether a repository-relative path is excluded from scanning
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = Path::new(path);
        if self.exclusions.is_match(path) {
            return true;
        }
        path.file_name()
            .map(|name| self.exclusions.is_match(Path::new(name)))
            .unwrap_or(false)
    }

    /// Diff text between `base_ref` and `head_ref` with excluded files removed
    pub fn extract(
        &self,
        vcs: &dyn VersionControl,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<String> {
        let raw = vcs.diff(base_ref, head_ref)?;
        Ok(self.filter(&raw))
    }

    /// Staged-versus-HEAD diff text with excluded files removed
    pub fn extract_staged(&self, vcs: &dyn VersionControl) -> Result<String> {
        let raw = vcs.staged_diff()?;
        Ok(self.filter(&raw))
    }

    /// Drop every file section whose path matches an exclusion rule
    pub fn filter(&self, diff_text: &str) -> String {
        let mut kept = String::with_capacity(diff_text.len());
        let mut excluded_files = 0usize;

        for section in split_file_sections(diff_text) {
            match section_path(&section) {
                Some(path) if self.is_excluded(&path) => {
                    tracing::debug!("Excluding {} from scan", path);
                    excluded_files += 1;
                }
                _ => kept.push_str(&section),
            }
        }

        if excluded_files > 0 {
            tracing::info!("Excluded {} file(s) from secret scanning", excluded_files);
        }
        kept
    }
}

/// Split diff text into per-file sections, each starting at `diff --git`.
///
/// Text without git headers is returned as a single section.
fn split_file_sections(diff_text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in diff_text.split_inclusive('\n') {
        if line.starts_with("diff --git ") && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

/// Repository-relative path a file section applies to
fn section_path(section: &str) -> Option<String> {
    let mut old_path = None;
    let mut header_path = None;

    for line in section.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            header_path = rest.rsplit_once(" b/").map(|(_, b)| b.to_string());
        } else if let Some(rest) = line.strip_prefix("--- ") {
            old_path = strip_side_prefix(rest, "a/");
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            return strip_side_prefix(rest, "b/").or(old_path).or(header_path);
        } else if line.starts_with("@@") {
            break;
        }
    }
    header_path.or(old_path)
}

fn strip_side_prefix(path: &str, prefix: &str) -> Option<String> {
    let path = path.split('\t').next().unwrap_or(path).trim();
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix(prefix).unwrap_or(path).to_string())
}

/// Parse the added lines out of unified diff text
pub fn added_lines(diff_text: &str) -> Vec<AddedLine> {
    let mut added = Vec::new();
    let mut current_file: Option<String> = None;
    let mut old_remaining = 0usize;
    let mut new_remaining = 0usize;
    let mut new_line = 0usize;

    for line in diff_text.lines() {
        let in_hunk = old_remaining > 0 || new_remaining > 0;

        if !in_hunk {
            if let Some(rest) = line.strip_prefix("+++ ") {
                current_file = strip_side_prefix(rest, "b/");
            } else if let Some(caps) = HUNK_HEADER.captures(line) {
                old_remaining = count(caps.get(1).map(|m| m.as_str()));
                new_line = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                new_remaining = count(caps.get(3).map(|m| m.as_str()));
            }
            continue;
        }

        match line.chars().next() {
            Some('+') => {
                if let Some(file) = &current_file {
                    added.push(AddedLine {
                        file_path: file.clone(),
                        line_number: new_line,
                        content: line[1..].to_string(),
                    });
                }
                new_line += 1;
                new_remaining = new_remaining.saturating_sub(1);
            }
            Some('-') => old_remaining = old_remaining.saturating_sub(1),
            Some('\\') => {}
            _ => {
                new_line += 1;
                old_remaining = old_remaining.saturating_sub(1);
                new_remaining = new_remaining.saturating_sub(1);
            }
        }
    }

    added
}

/// Hunk ranges omit the count when it is 1
fn count(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.parse().ok()).unwrap_or(1)
}
