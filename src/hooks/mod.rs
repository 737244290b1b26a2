//! Git hooks management
//!
//! Shipguard installs a single hook, `pre-push`, which runs the security gate
//! so that nothing leaves the machine without a passing verdict even when
//! `git push` is used directly instead of `shipguard publish`.

use crate::error::{Result, ShipguardError};
use crate::git::GitRepo;
use std::path::PathBuf;

pub mod pre_push;

/// Hooks Shipguard knows how to install and run
pub const SUPPORTED_HOOKS: &[&str] = &[pre_push::HOOK_NAME];

/// Marker line identifying scripts written by Shipguard
pub const HOOK_MARKER: &str = "# Installed by shipguard";

fn script_for(hook_name: &str) -> Result<String> {
    match hook_name {
        pre_push::HOOK_NAME => Ok(pre_push::script()),
        other => Err(ShipguardError::configuration(format!(
            "unsupported hook '{other}' (supported: {})",
            SUPPORTED_HOOKS.join(", ")
        ))),
    }
}

/// Write the hook script; a foreign hook is only replaced with `force`
pub fn install(repo: &GitRepo, hook_name: &str, force: bool) -> Result<PathBuf> {
    let script = script_for(hook_name)?;
    if repo.hook_exists(hook_name) && !force && !is_ours(repo, hook_name) {
        return Err(ShipguardError::configuration(format!(
            "a {hook_name} hook already exists; use --force to replace it"
        )));
    }
    repo.install_hook(hook_name, &script)
}

/// Remove the hook if Shipguard installed it; returns whether a file was removed
pub fn remove(repo: &GitRepo, hook_name: &str) -> Result<bool> {
    script_for(hook_name)?;
    if repo.hook_exists(hook_name) && !is_ours(repo, hook_name) {
        tracing::warn!("Leaving {} hook alone: not installed by shipguard", hook_name);
        return Ok(false);
    }
    repo.remove_hook(hook_name)
}

fn is_ours(repo: &GitRepo, hook_name: &str) -> bool {
    let path = repo.git_dir().join("hooks").join(hook_name);
    std::fs::read_to_string(path)
        .map(|content| content.contains(HOOK_MARKER))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use std::fs;
    use tempfile::TempDir;

    fn repo() -> (TempDir, GitRepo) {
        let temp_dir = TempDir::new().unwrap();
        Repository::init(temp_dir.path()).unwrap();
        let repo = GitRepo::open(temp_dir.path()).unwrap();
        (temp_dir, repo)
    }

    #[test]
    fn test_install_writes_executable_gate_hook() {
        let (_temp_dir, repo) = repo();

        let path = install(&repo, "pre-push", false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/sh"));
        assert!(content.contains("shipguard gate"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_install_refuses_to_clobber_foreign_hook() {
        let (_temp_dir, repo) = repo();
        repo.install_hook("pre-push", "#!/bin/sh\nexit 0\n").unwrap();

        assert!(install(&repo, "pre-push", false).is_err());
        assert!(install(&repo, "pre-push", true).is_ok());
        // Reinstalling our own hook needs no force
        assert!(install(&repo, "pre-push", false).is_ok());
    }

    #[test]
    fn test_remove_only_touches_own_hook() {
        let (_temp_dir, repo) = repo();
        repo.install_hook("pre-push", "#!/bin/sh\nexit 0\n").unwrap();
        assert!(!remove(&repo, "pre-push").unwrap());
        assert!(repo.hook_exists("pre-push"));

        install(&repo, "pre-push", true).unwrap();
        assert!(remove(&repo, "pre-push").unwrap());
        assert!(!repo.hook_exists("pre-push"));
    }

    #[test]
    fn test_unknown_hook_rejected() {
        let (_temp_dir, repo) = repo();
        assert!(install(&repo, "pre-commit", false).is_err());
    }
}
