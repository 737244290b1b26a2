//! Convergence controller
//!
//! One iteration: poll, difference against the previous snapshot, classify,
//! apply fixes, publish, then compare defect locations with the previous
//! iteration. Terminal states are `Clean`, `LimitReached`, `LoopDetected` and
//! `NoProgress`; once terminal the state never changes again.

use super::artifacts::ArtifactStore;
use super::classifier::{ClassifiedComment, ClassifiedCounts, FeedbackClassifier};
use super::differ::new_since;
use super::poller::FeedbackPoller;
use super::{ChangeId, CommentSource, FixApplier, Location, Publisher, ReviewComment};
use crate::config::ReviewConfig;
use crate::error::{Result, ShipguardError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Running,
    Clean,
    LimitReached,
    LoopDetected,
    NoProgress,
}

impl ConvergenceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }
}

impl fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceStatus::Running => write!(f, "running"),
            ConvergenceStatus::Clean => write!(f, "clean"),
            ConvergenceStatus::LimitReached => write!(f, "limit reached"),
            ConvergenceStatus::LoopDetected => write!(f, "loop detected"),
            ConvergenceStatus::NoProgress => write!(f, "no progress"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceState {
    pub iteration_number: u32,
    pub max_iterations: u32,
    /// Locations from the previous iteration's new comments
    pub prior_issue_locations: BTreeSet<Location>,
    pub status: ConvergenceStatus,
}

impl ConvergenceState {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            iteration_number: 1,
            max_iterations,
            prior_issue_locations: BTreeSet::new(),
            status: ConvergenceStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ConvergenceStatus::Running
    }

    /// Move to a terminal status; ignored once terminal
    pub fn finish(&mut self, status: ConvergenceStatus) {
        if self.is_running() {
            tracing::info!(
                "Convergence finished at iteration {}: {}",
                self.iteration_number,
                status
            );
            self.status = status;
        }
    }

    /// True when any of `locations` was already flagged last iteration
    pub fn repeats_prior(&self, locations: &BTreeSet<Location>) -> bool {
        !self.prior_issue_locations.is_disjoint(locations)
    }

    /// Start the next iteration, or stop at the cap
    pub fn advance(&mut self, locations: BTreeSet<Location>) {
        if !self.is_running() {
            return;
        }
        self.prior_issue_locations = locations;
        self.iteration_number += 1;
        if self.iteration_number > self.max_iterations {
            self.finish(ConvergenceStatus::LimitReached);
        } else {
            tracing::info!(
                "Starting iteration {}/{}",
                self.iteration_number,
                self.max_iterations
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    pub iteration_number: u32,
    /// Every reviewer comment observed by the poll
    pub comments: Vec<ReviewComment>,
    pub new_comment_ids: Vec<u64>,
    pub classifications: Vec<ClassifiedComment>,
    pub classified_counts: ClassifiedCounts,
    pub locations: BTreeSet<Location>,
    pub files_changed: Vec<String>,
}

impl IterationSnapshot {
    fn observed(iteration_number: u32, comments: Vec<ReviewComment>) -> Self {
        Self {
            iteration_number,
            comments,
            new_comment_ids: Vec::new(),
            classifications: Vec::new(),
            classified_counts: ClassifiedCounts::default(),
            locations: BTreeSet::new(),
            files_changed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub status: ConvergenceStatus,
    /// Interrupted between poll attempts; `status` is the state at that moment
    pub cancelled: bool,
    pub change_id: ChangeId,
    pub iterations: Vec<IterationSnapshot>,
}

impl ConvergenceReport {
    pub fn remediation(&self) -> String {
        if self.cancelled {
            return format!(
                "Cancelled during iteration {}. Re-run `shipguard converge --pr {}` to resume.",
                self.iterations.len().max(1),
                self.change_id.0
            );
        }
        match self.status {
            ConvergenceStatus::Clean => "No outstanding review feedback.".to_string(),
            ConvergenceStatus::LimitReached => format!(
                "Iteration limit reached with feedback still open on {}. Review the remaining comments manually.",
                self.change_id
            ),
            ConvergenceStatus::LoopDetected => {
                let repeated: Vec<String> = self
                    .repeated_locations()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                format!(
                    "The same locations were flagged again after a fix ({}). A human needs to look at them.",
                    repeated.join(", ")
                )
            }
            ConvergenceStatus::NoProgress => {
                "The fix applier made no changes. Set review.fix_command or address the feedback manually."
                    .to_string()
            }
            ConvergenceStatus::Running => "Loop stopped before reaching a verdict.".to_string(),
        }
    }

    /// Locations shared by the last two iterations
    pub fn repeated_locations(&self) -> BTreeSet<Location> {
        match self.iterations.as_slice() {
            [.., previous, last] => previous
                .locations
                .intersection(&last.locations)
                .cloned()
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            return 130;
        }
        match self.status {
            ConvergenceStatus::Clean => 0,
            ConvergenceStatus::LimitReached => 2,
            ConvergenceStatus::LoopDetected => 3,
            ConvergenceStatus::NoProgress => 4,
            ConvergenceStatus::Running => 130,
        }
    }
}

/// A hard failure inside the loop, with the history gathered so far
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ConvergenceError {
    #[source]
    pub error: ShipguardError,
    pub report: Box<ConvergenceReport>,
}

pub struct ConvergenceController<'a> {
    source: &'a dyn CommentSource,
    applier: &'a dyn FixApplier,
    publisher: &'a dyn Publisher,
    poller: FeedbackPoller,
    classifier: FeedbackClassifier,
    max_iterations: u32,
    artifacts: Option<ArtifactStore>,
}

impl<'a> ConvergenceController<'a> {
    pub fn new(
        source: &'a dyn CommentSource,
        applier: &'a dyn FixApplier,
        publisher: &'a dyn Publisher,
        config: &ReviewConfig,
    ) -> Result<Self> {
        Ok(Self {
            source,
            applier,
            publisher,
            poller: FeedbackPoller::from_config(config),
            classifier: FeedbackClassifier::from_config(config)?,
            max_iterations: config.max_iterations.max(1),
            artifacts: None,
        })
    }

    pub fn with_poller(mut self, poller: FeedbackPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Drive the loop for `change` until a terminal status or cancellation.
    ///
    /// Cancellation is not an error: the report comes back with
    /// `cancelled = true`. Collaborator failures (publish conflicts, missing
    /// tools) come back as [`ConvergenceError`] carrying the partial history.
    pub async fn run(
        &self,
        change: ChangeId,
        cancel: &CancellationToken,
    ) -> std::result::Result<ConvergenceReport, ConvergenceError> {
        let mut state = ConvergenceState::new(self.max_iterations);
        let mut report = ConvergenceReport {
            status: state.status,
            cancelled: false,
            change_id: change,
            iterations: Vec::new(),
        };

        while state.is_running() {
            match self.iterate(&mut state, &mut report, cancel).await {
                Ok(()) => {}
                Err(ShipguardError::Cancelled) => {
                    tracing::warn!("Convergence cancelled at iteration {}", state.iteration_number);
                    report.cancelled = true;
                    break;
                }
                Err(error) => {
                    report.status = state.status;
                    self.record_report(&report);
                    return Err(ConvergenceError {
                        error,
                        report: Box::new(report),
                    });
                }
            }
        }

        report.status = state.status;
        self.record_report(&report);
        Ok(report)
    }

    async fn iterate(
        &self,
        state: &mut ConvergenceState,
        report: &mut ConvergenceReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let number = state.iteration_number;
        let previous = report.iterations.last().map(|s| s.comments.as_slice());
        let seen: HashSet<u64> = previous
            .unwrap_or_default()
            .iter()
            .map(|c| c.id)
            .collect();

        let comments = self
            .poller
            .poll(self.source, report.change_id, &seen, cancel)
            .await?;
        let new_comments = new_since(previous, &comments);
        let mut snapshot = IterationSnapshot::observed(number, comments);

        if new_comments.is_empty() {
            self.push_snapshot(report, snapshot);
            state.finish(ConvergenceStatus::Clean);
            return Ok(());
        }

        let classified = self.classifier.classify_all(&new_comments);
        snapshot.new_comment_ids = new_comments.iter().map(|c| c.id).collect();
        snapshot.classified_counts = ClassifiedCounts::tally(&classified);
        snapshot.locations = new_comments.iter().filter_map(|c| c.location()).collect();
        tracing::info!(
            "Iteration {}: {} new comment(s) ({} blocking, {} suggestion, {} other)",
            number,
            new_comments.len(),
            snapshot.classified_counts.blocking,
            snapshot.classified_counts.suggestion,
            snapshot.classified_counts.other
        );

        let fix = match self.applier.apply(number, &classified).await {
            Ok(fix) => fix,
            Err(e) => {
                snapshot.classifications = classified;
                self.push_snapshot(report, snapshot);
                return Err(e);
            }
        };
        snapshot.classifications = classified;
        snapshot.files_changed = fix.files_changed;

        if snapshot.files_changed.is_empty() {
            self.push_snapshot(report, snapshot);
            state.finish(ConvergenceStatus::NoProgress);
            return Ok(());
        }

        let message = format!(
            "Address review feedback (iteration {}): {} blocking, {} suggestion(s)",
            number, snapshot.classified_counts.blocking, snapshot.classified_counts.suggestion
        );
        let locations = snapshot.locations.clone();
        self.push_snapshot(report, snapshot);

        let published = self.publisher.commit_and_publish(&message).await?;
        if published != report.change_id {
            tracing::warn!(
                "Publisher returned {} while converging {}",
                published,
                report.change_id
            );
        }

        if state.repeats_prior(&locations) {
            state.finish(ConvergenceStatus::LoopDetected);
        } else {
            state.advance(locations);
        }
        Ok(())
    }

    fn push_snapshot(&self, report: &mut ConvergenceReport, snapshot: IterationSnapshot) {
        if let Some(store) = &self.artifacts {
            store.record_snapshot(&snapshot);
        }
        report.iterations.push(snapshot);
    }

    fn record_report(&self, report: &ConvergenceReport) {
        if let Some(store) = &self.artifacts {
            store.record_report(report);
        }
    }
}
