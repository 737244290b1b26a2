//! External fix applier
//!
//! Shipguard never edits code itself. Each iteration's classified comments are
//! written to `<feedback_dir>/iteration-<n>.json` and the configured command
//! is run with that path as its last argument. Whatever the command changed in
//! the working tree is read back from git status.

use super::artifacts::ArtifactStore;
use super::{ClassifiedComment, FixApplier, FixReport};
use crate::error::{Result, ShipguardError};
use crate::git::GitRepo;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use tokio::process::Command;

pub struct CommandFixApplier {
    command: Option<String>,
    workdir: PathBuf,
    artifacts: ArtifactStore,
}

impl CommandFixApplier {
    pub fn new(command: Option<String>, workdir: PathBuf, artifacts: ArtifactStore) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
            workdir,
            artifacts,
        }
    }

    /// Content fingerprint of every uncommitted path outside the feedback directory
    fn fingerprint(&self) -> Result<BTreeMap<String, Option<u64>>> {
        let repo = GitRepo::open(&self.workdir)?;
        let feedback_dir = self
            .artifacts
            .dir()
            .strip_prefix(&self.workdir)
            .unwrap_or(self.artifacts.dir())
            .to_path_buf();

        let mut prints = BTreeMap::new();
        for path in repo.get_changed_files()? {
            if !feedback_dir.as_os_str().is_empty() && PathBuf::from(&path).starts_with(&feedback_dir) {
                continue;
            }
            let digest = std::fs::read(self.workdir.join(&path)).ok().map(|bytes| {
                let mut hasher = DefaultHasher::new();
                bytes.hash(&mut hasher);
                hasher.finish()
            });
            prints.insert(path, digest);
        }
        Ok(prints)
    }
}

/// Paths whose fingerprint differs between two snapshots, including reverted ones
fn changed_between(
    before: &BTreeMap<String, Option<u64>>,
    after: &BTreeMap<String, Option<u64>>,
) -> Vec<String> {
    let mut changed: Vec<String> = after
        .iter()
        .filter(|(path, digest)| before.get(*path) != Some(*digest))
        .map(|(path, _)| path.clone())
        .collect();
    changed.extend(
        before
            .keys()
            .filter(|path| !after.contains_key(*path))
            .cloned(),
    );
    changed.sort();
    changed
}

#[async_trait]
impl FixApplier for CommandFixApplier {
    async fn apply(&self, iteration: u32, comments: &[ClassifiedComment]) -> Result<FixReport> {
        let feedback = self.artifacts.write_feedback(iteration, comments)?;

        let Some(command) = &self.command else {
            tracing::warn!(
                "No review.fix_command configured; feedback left at {}",
                feedback.display()
            );
            return Ok(FixReport::default());
        };

        let before = self.fingerprint()?;

        tracing::info!("Running fix command: {} {}", command, feedback.display());
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("{command} \"$1\""))
            .arg("shipguard-fix")
            .arg(&feedback)
            .current_dir(&self.workdir)
            .output()
            .await?;

        if !output.stdout.is_empty() {
            tracing::debug!("Fix command output: {}", String::from_utf8_lossy(&output.stdout));
        }
        if !output.status.success() {
            return Err(ShipguardError::Command {
                command: command.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let files_changed = changed_between(&before, &self.fingerprint()?);
        tracing::info!(
            "Fix command changed {} file(s) in iteration {}",
            files_changed.len(),
            iteration
        );
        Ok(FixReport { files_changed })
    }
}
