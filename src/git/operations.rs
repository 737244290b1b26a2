use super::{GitRepo, VersionControl};
use crate::error::{Result, ShipguardError};
use git2::{Diff, DiffFormat, DiffOptions, Oid, Status, StatusOptions, Tree};
use std::path::Path;

impl GitRepo {
    /// Get list of files that are staged for commit
    pub fn get_staged_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut status_opts = StatusOptions::new();
        status_opts.include_ignored(false);
        status_opts.include_untracked(false);

        let statuses = self.repo.statuses(Some(&mut status_opts))?;

        for entry in statuses.iter() {
            let status = entry.status();
            if status.intersects(
                Status::INDEX_NEW
                    | Status::INDEX_MODIFIED
                    | Status::INDEX_RENAMED
                    | Status::INDEX_TYPECHANGE,
            ) {
                if let Some(path) = entry.path() {
                    files.push(path.to_string());
                }
            }
        }

        Ok(files)
    }

    /// Files with uncommitted changes (staged, unstaged or untracked)
    pub fn get_changed_files(&self) -> Result<Vec<String>> {
        let mut status_opts = StatusOptions::new();
        status_opts.include_ignored(false);
        status_opts.include_untracked(true);
        status_opts.recurse_untracked_dirs(true);

        let statuses = self.repo.statuses(Some(&mut status_opts))?;
        let mut files: Vec<String> = statuses
            .iter()
            .filter(|entry| entry.status() != Status::CURRENT)
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn tree_for(&self, revision: &str) -> Result<Tree<'_>> {
        Ok(self.repo.revparse_single(revision)?.peel_to_tree()?)
    }

    /// Base of the comparison: the merge base when one exists, otherwise `base_ref` itself
    fn comparison_base(&self, base_ref: &str, head_ref: &str) -> Result<Oid> {
        let base = self.repo.revparse_single(base_ref)?.peel_to_commit()?.id();
        let head = self.repo.revparse_single(head_ref)?.peel_to_commit()?.id();
        match self.repo.merge_base(base, head) {
            Ok(oid) => Ok(oid),
            Err(e) => {
                tracing::debug!("No merge base for {}..{}: {}", base_ref, head_ref, e);
                Ok(base)
            }
        }
    }

    fn head_tree(&self) -> Result<Option<Tree<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_tree()?)),
            // Unborn branch: everything staged is new
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_missing(e: &git2::Error) -> bool {
    matches!(
        e.code(),
        git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch
    )
}

/// Render a git2 diff as unified patch text
fn patch_text(diff: &Diff<'_>) -> Result<String> {
    let mut text = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let content = String::from_utf8_lossy(line.content());
        match line.origin() {
            origin @ ('+' | '-' | ' ') => {
                text.push(origin);
                text.push_str(&content);
            }
            _ => text.push_str(&content),
        }
        true
    })?;
    Ok(text)
}

impl VersionControl for GitRepo {
    fn diff(&self, base_ref: &str, head_ref: &str) -> Result<String> {
        let head_tree = match self.tree_for(head_ref) {
            Ok(tree) => tree,
            Err(ShipguardError::Git(e)) if is_missing(&e) => {
                tracing::debug!("{} does not resolve yet; nothing committed to scan", head_ref);
                return Ok(String::new());
            }
            Err(e) => return Err(e),
        };
        let base_tree = match self.comparison_base(base_ref, head_ref) {
            Ok(oid) => Some(self.repo.find_commit(oid)?.tree()?),
            Err(ShipguardError::Git(e)) if is_missing(&e) => {
                tracing::warn!("{} not found; scanning all of {}", base_ref, head_ref);
                None
            }
            Err(e) => return Err(e),
        };

        let mut opts = DiffOptions::new();
        opts.context_lines(0);
        let diff = self
            .repo
            .diff_tree_to_tree(base_tree.as_ref(), Some(&head_tree), Some(&mut opts))?;

        let text = patch_text(&diff)?;
        tracing::debug!(
            "Extracted {} bytes of diff for {}..{}",
            text.len(),
            base_ref,
            head_ref
        );
        Ok(text)
    }

    fn staged_diff(&self) -> Result<String> {
        let head_tree = self.head_tree()?;
        let mut opts = DiffOptions::new();
        opts.context_lines(0);
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, Some(&mut opts))?;
        patch_text(&diff)
    }

    fn staged_files(&self) -> Result<Vec<String>> {
        self.get_staged_files()
    }

    fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }
}
