//! Ignore-file auditing
//!
//! Makes sure sensitive path patterns (environment files, private keys, the
//! feedback artifact directory) are listed in the repository ignore file.
//! Missing entries are appended one per line; existing content and order are
//! left untouched, so a second run appends nothing.

use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::Path;

pub struct IgnoreListAuditor {
    required: Vec<String>,
}

impl IgnoreListAuditor {
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }

    /// Required entries not present in `content`
    pub fn missing<'a>(&'a self, content: &str) -> Vec<&'a str> {
        let present: Vec<&str> = content.lines().map(str::trim).collect();
        let mut missing: Vec<&str> = Vec::new();
        for pattern in &self.required {
            let pattern = pattern.trim();
            if !pattern.is_empty()
                && !present.iter().any(|line| *line == pattern)
                && !missing.contains(&pattern)
            {
                missing.push(pattern);
            }
        }
        missing
    }

    /// Append every missing required entry to `ignore_file`, creating it if needed.
    ///
    /// Returns the entries that were appended.
    pub fn ensure(&self, ignore_file: &Path) -> Result<Vec<String>> {
        let content = match fs::read_to_string(ignore_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let missing: Vec<String> = self
            .missing(&content)
            .into_iter()
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            tracing::debug!("{} already lists every required entry", ignore_file.display());
            return Ok(missing);
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(ignore_file)?;
        if !content.is_empty() && !content.ends_with('\n') {
            writeln!(file)?;
        }
        for pattern in &missing {
            writeln!(file, "{pattern}")?;
        }

        tracing::warn!(
            "Added {} missing entr{} to {}: {}",
            missing.len(),
            if missing.len() == 1 { "y" } else { "ies" },
            ignore_file.display(),
            missing.join(", ")
        );
        Ok(missing)
    }
}
