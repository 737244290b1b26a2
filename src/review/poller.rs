//! Feedback polling
//!
//! The poller is the only place the loop sleeps. Each sleep is raced against a
//! cancellation token so an interrupt between attempts abandons the poll
//! without touching any state.

use super::{ChangeId, CommentSource, ReviewComment};
use crate::config::ReviewConfig;
use crate::error::{Result, ShipguardError};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Case-insensitive substring allow-list of reviewer identities
#[derive(Debug, Clone)]
pub struct IdentityFilter {
    markers: Vec<String>,
}

impl IdentityFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, author: &str) -> bool {
        let author = author.to_lowercase();
        self.markers.iter().any(|marker| author.contains(marker))
    }

    pub fn retain(&self, comments: Vec<ReviewComment>) -> Vec<ReviewComment> {
        comments
            .into_iter()
            .filter(|comment| self.matches(&comment.author))
            .collect()
    }
}

pub struct FeedbackPoller {
    filter: IdentityFilter,
    interval: Duration,
    max_attempts: u32,
}

impl FeedbackPoller {
    pub fn new(filter: IdentityFilter, interval: Duration, max_attempts: u32) -> Self {
        Self {
            filter,
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &ReviewConfig) -> Self {
        Self::new(
            IdentityFilter::new(&config.reviewer_identities),
            config.poll_interval(),
            config.max_poll_attempts,
        )
    }

    /// Upper bound on the time one poll can block
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Poll `source` until a reviewer comment not in `seen` shows up.
    ///
    /// Returns the full filtered snapshot from the attempt that found something
    /// new. When every attempt comes back with nothing new, the last filtered
    /// snapshot is returned (empty if no reviewer ever commented); that is a
    /// timeout, not an error.
    pub async fn poll(
        &self,
        source: &dyn CommentSource,
        change: ChangeId,
        seen: &HashSet<u64>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReviewComment>> {
        let mut last = Vec::new();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(ShipguardError::Cancelled);
            }

            let comments = self.filter.retain(source.fetch(change).await?);
            let unseen = comments.iter().filter(|c| !seen.contains(&c.id)).count();
            tracing::info!(
                "Poll attempt {}/{} on {}: {} reviewer comment(s), {} new",
                attempt,
                self.max_attempts,
                change,
                comments.len(),
                unseen
            );

            if unseen > 0 {
                return Ok(comments);
            }
            last = comments;

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ShipguardError::Cancelled),
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        }

        tracing::info!(
            "No new reviewer feedback on {} after {} attempt(s)",
            change,
            self.max_attempts
        );
        Ok(last)
    }
}
