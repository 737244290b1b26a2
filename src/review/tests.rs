//! Convergence loop tests against in-memory collaborators

use super::*;
use async_trait::async_trait;
use crate::config::ReviewConfig;
use crate::error::{Result, ShipguardError};
use crate::review::artifacts::ArtifactStore;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Pops one scripted response per fetch, then keeps returning the last one
struct ScriptedSource {
    responses: Mutex<VecDeque<Vec<ReviewComment>>>,
    last: Mutex<Vec<ReviewComment>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    fn new(responses: Vec<Vec<ReviewComment>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CommentSource for ScriptedSource {
    async fn fetch(&self, _change: ChangeId) -> Result<Vec<ReviewComment>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

struct FakeApplier {
    edits: Mutex<VecDeque<Vec<String>>>,
    received: Mutex<Vec<Vec<u64>>>,
}

impl FakeApplier {
    fn editing(files: &[&str]) -> Self {
        let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        let edits: VecDeque<Vec<String>> = std::iter::repeat_n(files, 16).collect();
        Self {
            edits: Mutex::new(edits),
            received: Mutex::new(Vec::new()),
        }
    }

    fn idle() -> Self {
        Self::editing(&[])
    }

    fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl FixApplier for FakeApplier {
    async fn apply(&self, _iteration: u32, comments: &[ClassifiedComment]) -> Result<FixReport> {
        self.received
            .lock()
            .unwrap()
            .push(comments.iter().map(|c| c.comment.id).collect());
        let files_changed = self.edits.lock().unwrap().pop_front().unwrap_or_default();
        Ok(FixReport { files_changed })
    }
}

struct FakePublisher {
    calls: AtomicUsize,
    fail: bool,
}

impl FakePublisher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn commit_and_publish(&self, _message: &str) -> Result<ChangeId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ShipguardError::Publish(
                "rejected: non-fast-forward".to_string(),
            ));
        }
        Ok(ChangeId(17))
    }
}

fn comment(id: u64, path: Option<&str>, line: u32, body: &str) -> ReviewComment {
    ReviewComment {
        id,
        author: "claude[bot]".to_string(),
        file_path: path.map(str::to_string),
        line: path.map(|_| line),
        body: body.to_string(),
        timestamp: "2026-01-01T00:00:00Z".to_string(),
        url: format!("https://example.invalid/comments/{id}"),
    }
}

fn fast_poller() -> FeedbackPoller {
    FeedbackPoller::new(IdentityFilter::new(["claude", "bot"]), Duration::from_secs(1), 2)
}

fn controller<'a>(
    source: &'a ScriptedSource,
    applier: &'a FakeApplier,
    publisher: &'a FakePublisher,
) -> ConvergenceController<'a> {
    ConvergenceController::new(source, applier, publisher, &ReviewConfig::default())
        .unwrap()
        .with_poller(fast_poller())
}

#[tokio::test(start_paused = true)]
async fn test_repeated_location_is_loop_detected_at_second_iteration() {
    let first = vec![
        comment(1, Some("src/a.ts"), 10, "Critical: unvalidated input"),
        comment(2, Some("src/a.ts"), 20, "Consider renaming"),
        comment(3, Some("src/b.ts"), 5, "error path leaks handle"),
    ];
    let mut second = first.clone();
    second.push(comment(4, Some("src/a.ts"), 10, "Still unvalidated"));
    let source = ScriptedSource::new(vec![first, second]);
    let applier = FakeApplier::editing(&["src/a.ts", "src/b.ts"]);
    let publisher = FakePublisher::new();

    let report = controller(&source, &applier, &publisher)
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ConvergenceStatus::LoopDetected);
    assert_eq!(report.iterations.len(), 2);
    assert_eq!(report.iterations[1].new_comment_ids, vec![4]);
    assert_eq!(
        report.repeated_locations().into_iter().collect::<Vec<_>>(),
        vec![Location {
            file: "src/a.ts".to_string(),
            line: Some(10)
        }]
    );
    // Fix is published before the loop check
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.exit_code(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_feedback_every_iteration_hits_limit() {
    let c1 = comment(1, Some("src/a.ts"), 1, "bug here");
    let c2 = comment(2, Some("src/a.ts"), 2, "bug there");
    let c3 = comment(3, Some("src/a.ts"), 3, "and another bug");
    let source = ScriptedSource::new(vec![
        vec![c1.clone()],
        vec![c1.clone(), c2.clone()],
        vec![c1, c2, c3],
    ]);
    let applier = FakeApplier::editing(&["src/a.ts"]);
    let publisher = FakePublisher::new();

    let report = controller(&source, &applier, &publisher)
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ConvergenceStatus::LimitReached);
    assert_eq!(report.iterations.len(), 3);
    let numbers: Vec<u32> = report.iterations.iter().map(|s| s.iteration_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(applier.calls(), 3);
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.exit_code(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_silent_reviewer_converges_clean_after_full_poll() {
    let source = ScriptedSource::new(vec![vec![ReviewComment {
        author: "alice".to_string(),
        ..comment(1, Some("src/a.ts"), 1, "critical")
    }]]);
    let applier = FakeApplier::editing(&["src/a.ts"]);
    let publisher = FakePublisher::new();
    let controller =
        ConvergenceController::new(&source, &applier, &publisher, &ReviewConfig::default())
            .unwrap();

    let start = tokio::time::Instant::now();
    let report = controller
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ConvergenceStatus::Clean);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 10);
    assert!(start.elapsed() <= Duration::from_secs(300));
    assert!(report.iterations[0].comments.is_empty());
    assert_eq!(applier.calls(), 0);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_edits_means_no_progress() {
    let source = ScriptedSource::new(vec![vec![comment(1, Some("src/a.ts"), 3, "must fix")]]);
    let applier = FakeApplier::idle();
    let publisher = FakePublisher::new();

    let report = controller(&source, &applier, &publisher)
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ConvergenceStatus::NoProgress);
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.iterations[0].classified_counts.blocking, 1);
    assert_eq!(report.exit_code(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_resolved_feedback_converges_clean() {
    let source = ScriptedSource::new(vec![vec![comment(1, Some("src/a.ts"), 3, "nit: spacing")]]);
    let applier = FakeApplier::editing(&["src/a.ts"]);
    let publisher = FakePublisher::new();

    let report = controller(&source, &applier, &publisher)
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ConvergenceStatus::Clean);
    assert_eq!(report.iterations.len(), 2);
    assert!(report.iterations[1].new_comment_ids.is_empty());
    assert_eq!(report.iterations[0].classified_counts.suggestion, 1);
}

#[tokio::test(start_paused = true)]
async fn test_comments_without_location_never_loop() {
    let c1 = comment(1, None, 0, "Overall: must fix the error handling");
    let c2 = comment(2, None, 0, "Still must fix the error handling");
    let source = ScriptedSource::new(vec![vec![c1.clone()], vec![c1, c2]]);
    let applier = FakeApplier::editing(&["src/lib.rs"]);
    let publisher = FakePublisher::new();
    let config = ReviewConfig {
        max_iterations: 2,
        ..ReviewConfig::default()
    };
    let controller = ConvergenceController::new(&source, &applier, &publisher, &config)
        .unwrap()
        .with_poller(fast_poller());

    let report = controller
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ConvergenceStatus::LimitReached);
    assert!(report.iterations.iter().all(|s| s.locations.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_propagates_with_history() {
    let source = ScriptedSource::new(vec![vec![comment(1, Some("src/a.ts"), 3, "bug")]]);
    let applier = FakeApplier::editing(&["src/a.ts"]);
    let publisher = FakePublisher::failing();

    let err = controller(&source, &applier, &publisher)
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.error, ShipguardError::Publish(_)));
    assert_eq!(err.report.iterations.len(), 1);
    assert_eq!(err.report.status, ConvergenceStatus::Running);
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_reports_partial_state() {
    let source = ScriptedSource::new(vec![vec![]]);
    let applier = FakeApplier::idle();
    let publisher = FakePublisher::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = controller(&source, &applier, &publisher)
        .run(ChangeId(17), &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.status, ConvergenceStatus::Running);
    assert!(report.iterations.is_empty());
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(report.exit_code(), 130);
}

#[tokio::test(start_paused = true)]
async fn test_artifacts_written_per_iteration() {
    let temp_dir = TempDir::new().unwrap();
    let source = ScriptedSource::new(vec![vec![comment(1, Some("src/a.ts"), 3, "bug")]]);
    let applier = FakeApplier::editing(&["src/a.ts"]);
    let publisher = FakePublisher::new();

    let report = controller(&source, &applier, &publisher)
        .with_artifacts(ArtifactStore::new(temp_dir.path()))
        .run(ChangeId(17), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, ConvergenceStatus::Clean);
    assert!(temp_dir.path().join("snapshot-1.json").exists());
    assert!(temp_dir.path().join("snapshot-2.json").exists());
    assert!(temp_dir.path().join("report.json").exists());
}

#[test]
fn test_terminal_state_is_sticky() {
    let mut state = ConvergenceState::new(1);
    state.finish(ConvergenceStatus::LoopDetected);
    state.finish(ConvergenceStatus::Clean);
    state.advance(Default::default());

    assert_eq!(state.status, ConvergenceStatus::LoopDetected);
    assert_eq!(state.iteration_number, 1);
}

#[test]
fn test_advance_past_cap_is_limit_reached() {
    let mut state = ConvergenceState::new(2);
    state.advance(Default::default());
    assert!(state.is_running());
    state.advance(Default::default());
    assert_eq!(state.status, ConvergenceStatus::LimitReached);
}
