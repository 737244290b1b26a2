//! Review feedback convergence loop
//!
//! After a change is published, reviewer-bot comments are polled, differenced
//! against the previous iteration, classified, handed to an external fix
//! applier, and the result re-published. The controller stops on a clean
//! review, the iteration cap, a repeated defect location, or a fix applier
//! that changed nothing.
//!
//! Reviewer identity is a configurable substring allow-list. Spoofing a
//! reviewer account is out of scope.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod artifacts;
pub mod classifier;
pub mod converge;
pub mod differ;
pub mod fixer;
pub mod github;
pub mod poller;

#[cfg(test)]
mod tests;

pub use classifier::{Category, ClassifiedComment, ClassifiedCounts, FeedbackClassifier};
pub use converge::{
    ConvergenceController, ConvergenceError, ConvergenceReport, ConvergenceState,
    ConvergenceStatus, IterationSnapshot,
};
pub use differ::new_since;
pub use poller::{FeedbackPoller, IdentityFilter};

/// Identifier of the published reviewable unit (pull request number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeId(pub u64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    /// Unique and stable across polls
    pub id: u64,
    pub author: String,
    pub file_path: Option<String>,
    pub line: Option<u32>,
    pub body: String,
    pub timestamp: String,
    pub url: String,
}

impl ReviewComment {
    /// Code location the comment is anchored to; conversation comments have none
    pub fn location(&self) -> Option<Location> {
        self.file_path.as_ref().map(|file| Location {
            file: file.clone(),
            line: self.line,
        })
    }
}

/// A `(file, line)` pair used for loop detection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: Option<u32>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// Files touched by one fix attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixReport {
    pub files_changed: Vec<String>,
}

/// Source of review comments for a published change
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn fetch(&self, change: ChangeId) -> Result<Vec<ReviewComment>>;
}

/// External actor that edits the working tree in response to comments
#[async_trait]
pub trait FixApplier: Send + Sync {
    async fn apply(&self, iteration: u32, comments: &[ClassifiedComment]) -> Result<FixReport>;
}

/// Commits local edits and publishes them for review
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn commit_and_publish(&self, message: &str) -> Result<ChangeId>;
}
