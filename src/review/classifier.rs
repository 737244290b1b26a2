//! Keyword classification of review comments
//!
//! Advisory only: the category drives the reported breakdown and the order in
//! which comments are handed to the fix applier, never the loop itself.

use super::ReviewComment;
use crate::config::ReviewConfig;
use crate::error::{Result, ShipguardError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Blocking,
    Suggestion,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Blocking => write!(f, "blocking"),
            Category::Suggestion => write!(f, "suggestion"),
            Category::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedComment {
    pub category: Category,
    #[serde(flatten)]
    pub comment: ReviewComment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedCounts {
    pub blocking: usize,
    pub suggestion: usize,
    pub other: usize,
}

impl ClassifiedCounts {
    pub fn tally(classified: &[ClassifiedComment]) -> Self {
        let mut counts = Self::default();
        for item in classified {
            match item.category {
                Category::Blocking => counts.blocking += 1,
                Category::Suggestion => counts.suggestion += 1,
                Category::Other => counts.other += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.blocking + self.suggestion + self.other
    }
}

pub struct FeedbackClassifier {
    blocking: Option<Regex>,
    suggestion: Option<Regex>,
}

impl FeedbackClassifier {
    pub fn from_config(config: &ReviewConfig) -> Result<Self> {
        Ok(Self {
            blocking: keyword_regex("blocking keywords", &config.blocking_keywords)?,
            suggestion: keyword_regex("suggestion keywords", &config.suggestion_keywords)?,
        })
    }

    /// Blocking keywords take precedence when a body matches both sets
    pub fn classify(&self, comment: &ReviewComment) -> Category {
        let matches = |regex: &Option<Regex>| {
            regex
                .as_ref()
                .is_some_and(|regex| regex.is_match(&comment.body))
        };

        if matches(&self.blocking) {
            Category::Blocking
        } else if matches(&self.suggestion) {
            Category::Suggestion
        } else {
            Category::Other
        }
    }

    /// Classify every comment, ordered blocking first (stable within a category)
    pub fn classify_all(&self, comments: &[ReviewComment]) -> Vec<ClassifiedComment> {
        let mut classified: Vec<ClassifiedComment> = comments
            .iter()
            .map(|comment| ClassifiedComment {
                category: self.classify(comment),
                comment: comment.clone(),
            })
            .collect();
        classified.sort_by_key(|item| item.category);
        classified
    }
}

/// Case-insensitive alternation of keywords anchored on word boundaries
fn keyword_regex(label: &str, keywords: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| regex::escape(k).replace(' ', r"\s+"))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|source| ShipguardError::InvalidPattern {
            label: label.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: u64, body: &str) -> ReviewComment {
        ReviewComment {
            id,
            author: "claude[bot]".to_string(),
            file_path: None,
            line: None,
            body: body.to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            url: String::new(),
        }
    }

    fn classifier() -> FeedbackClassifier {
        FeedbackClassifier::from_config(&ReviewConfig::default()).unwrap()
    }

    #[test]
    fn test_severity_markers_are_blocking() {
        let classifier = classifier();
        for body in [
            "This MUST FIX before merge",
            "Critical: unchecked input",
            "Possible security hole here",
            "This returns an error on empty input",
        ] {
            assert_eq!(classifier.classify(&comment(1, body)), Category::Blocking, "{body}");
        }
    }

    #[test]
    fn test_soft_markers_are_suggestions() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify(&comment(1, "Consider extracting a helper")),
            Category::Suggestion
        );
        assert_eq!(
            classifier.classify(&comment(2, "nit: trailing whitespace")),
            Category::Suggestion
        );
    }

    #[test]
    fn test_blocking_wins_over_suggestion() {
        assert_eq!(
            classifier().classify(&comment(1, "Nit, but this is a security issue")),
            Category::Blocking
        );
    }

    #[test]
    fn test_plain_must_is_not_a_severity_marker() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify(&comment(1, "This must be nice to maintain")),
            Category::Other
        );
        assert_eq!(
            classifier.classify(&comment(2, "You must\n  fix the retry loop")),
            Category::Blocking
        );
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        // "nit" inside "unit", "bug" inside "debugging"
        assert_eq!(
            classifier().classify(&comment(1, "Thanks for the unit tests and debugging notes")),
            Category::Other
        );
    }

    #[test]
    fn test_classify_all_orders_blocking_first() {
        let comments = vec![
            comment(1, "Looks good"),
            comment(2, "optional: rename"),
            comment(3, "critical bug"),
            comment(4, "another critical path"),
        ];

        let classified = classifier().classify_all(&comments);
        let ids: Vec<u64> = classified.iter().map(|c| c.comment.id).collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);

        let counts = ClassifiedCounts::tally(&classified);
        assert_eq!(
            counts,
            ClassifiedCounts {
                blocking: 2,
                suggestion: 1,
                other: 1
            }
        );
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_empty_keyword_sets_classify_as_other() {
        let config = ReviewConfig {
            blocking_keywords: vec![],
            suggestion_keywords: vec![" ".to_string()],
            ..ReviewConfig::default()
        };
        let classifier = FeedbackClassifier::from_config(&config).unwrap();
        assert_eq!(classifier.classify(&comment(1, "critical")), Category::Other);
    }
}
