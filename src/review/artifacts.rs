//! Iteration artifacts written under the feedback directory
//!
//! The directory is a required ignore-file entry, so nothing here is ever
//! tracked.

use super::ClassifiedComment;
use super::converge::{ConvergenceReport, IterationSnapshot};
use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Feedback handed to the fix applier for one iteration
    pub fn write_feedback(&self, iteration: u32, comments: &[ClassifiedComment]) -> Result<PathBuf> {
        self.write_json(&format!("iteration-{iteration}.json"), &comments)
    }

    /// Persist a finalized snapshot; failures are logged, never fatal
    pub fn record_snapshot(&self, snapshot: &IterationSnapshot) {
        let name = format!("snapshot-{}.json", snapshot.iteration_number);
        if let Err(e) = self.write_json(&name, snapshot) {
            tracing::warn!("Could not write {}: {}", name, e);
        }
    }

    pub fn record_report(&self, report: &ConvergenceReport) {
        if let Err(e) = self.write_json("report.json", report) {
            tracing::warn!("Could not write report.json: {}", e);
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::converge::ConvergenceStatus;
    use crate::review::{Category, ChangeId, ReviewComment};
    use tempfile::TempDir;

    #[test]
    fn test_feedback_file_lists_classified_comments() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path().join(".review-feedback"));
        let comments = vec![ClassifiedComment {
            category: Category::Blocking,
            comment: ReviewComment {
                id: 42,
                author: "claude[bot]".to_string(),
                file_path: Some("src/auth.ts".to_string()),
                line: Some(12),
                body: "Critical: token logged".to_string(),
                timestamp: "2026-01-01T00:00:00Z".to_string(),
                url: "https://example.invalid/42".to_string(),
            },
        }];

        let path = store.write_feedback(2, &comments).unwrap();

        assert!(path.ends_with(".review-feedback/iteration-2.json"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json[0]["category"], "blocking");
        assert_eq!(json[0]["id"], 42);
        assert_eq!(json[0]["file_path"], "src/auth.ts");
    }

    #[test]
    fn test_report_written_as_json() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let report = ConvergenceReport {
            status: ConvergenceStatus::Clean,
            cancelled: false,
            change_id: ChangeId(3),
            iterations: vec![],
        };

        store.record_report(&report);

        let written = fs::read_to_string(temp_dir.path().join("report.json")).unwrap();
        assert!(written.contains("\"status\": \"clean\""));
    }
}
