//! Git integration layer for Shipguard
//!
//! The security gate talks to version control through the [`VersionControl`]
//! trait; [`GitRepo`] implements it with git2. Hook installation lives here too.

use crate::error::Result;
use git2::Repository;
use std::path::{Path, PathBuf};

pub mod diff;
pub mod operations;

/// Version-control queries consumed by the security gate
pub trait VersionControl {
    /// Unified diff text between two revisions
    fn diff(&self, base_ref: &str, head_ref: &str) -> Result<String>;

    /// Unified diff text of the index against HEAD
    fn staged_diff(&self) -> Result<String>;

    /// Repository-relative paths currently staged for commit
    fn staged_files(&self) -> Result<Vec<String>>;

    /// Root of the working tree, if the repository has one
    fn workdir(&self) -> Option<&Path>;
}

pub struct GitRepo {
    pub repo: Repository,
}

impl GitRepo {
    /// Open a Git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path)?;
        Ok(Self { repo })
    }

    /// Discover and open a Git repository from current directory
    pub fn discover() -> Result<Self> {
        let repo = Repository::discover(".")?;
        Ok(Self { repo })
    }

    /// Get the current branch name
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        let shorthand = head.shorthand().unwrap_or("HEAD");
        Ok(shorthand.to_string())
    }

    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    fn hook_path(&self, hook_name: &str) -> PathBuf {
        self.repo.path().join("hooks").join(hook_name)
    }

    /// Install a git hook
    pub fn install_hook(&self, hook_name: &str, hook_content: &str) -> Result<PathBuf> {
        let hook_path = self.hook_path(hook_name);
        if let Some(hooks_dir) = hook_path.parent() {
            std::fs::create_dir_all(hooks_dir)?;
        }
        std::fs::write(&hook_path, hook_content)?;

        // Make hook executable on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&hook_path)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&hook_path, perms)?;
        }

        tracing::info!("Installed {} hook at {}", hook_name, hook_path.display());
        Ok(hook_path)
    }

    /// Remove a git hook; returns whether one existed
    pub fn remove_hook(&self, hook_name: &str) -> Result<bool> {
        let hook_path = self.hook_path(hook_name);
        if hook_path.exists() {
            std::fs::remove_file(&hook_path)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn hook_exists(&self, hook_name: &str) -> bool {
        self.hook_path(hook_name).exists()
    }
}
