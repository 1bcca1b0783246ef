//! Link records and collection result types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EngineKind;

/// Metadata stored for a collected link.
///
/// The URL itself is the key of the surrounding [`LinkMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Result title as shown by the search engine.
    pub title: String,
    /// Snippet or block text, when the engine provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LinkRecord {
    /// Creates a record with a title and no description.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    /// Sets the description. Blank descriptions are dropped.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }
}

/// URL-keyed link records, ordered so the persisted file is stable and diffable.
pub type LinkMap = BTreeMap<String, LinkRecord>;

/// Why an engine task stopped paginating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The configured page limit was hit.
    MaxPagesReached,
    /// No next-page control could be triggered.
    NoMoreResults,
    /// The initial query page could not be loaded.
    NavigationFailed,
    /// The browser session was closed externally.
    UserAborted,
    /// The overall collection deadline passed.
    DeadlineExceeded,
    /// The task failed (session launch, content retrieval, extraction, panic).
    Error,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MaxPagesReached => "max_pages_reached",
            Self::NoMoreResults => "no_more_results",
            Self::NavigationFailed => "navigation_failed",
            Self::UserAborted => "user_aborted",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of one engine task.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    /// Engine the task ran against.
    pub engine: EngineKind,
    /// Links newly found by this task.
    pub links: LinkMap,
    /// Number of result pages whose links were extracted.
    pub pages_visited: u32,
    /// Why pagination stopped.
    pub reason: TerminationReason,
    /// Error detail for `NavigationFailed` and `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionResult {
    /// Creates a result for a task that stopped without an error.
    pub fn new(engine: EngineKind, reason: TerminationReason) -> Self {
        Self {
            engine,
            links: LinkMap::new(),
            pages_visited: 0,
            reason,
            error: None,
        }
    }

    /// Creates a result for a task that failed.
    pub fn failed(engine: EngineKind, reason: TerminationReason, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(engine, reason)
        }
    }

    /// Returns true when the task ended because of a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.reason,
            TerminationReason::NavigationFailed | TerminationReason::Error
        )
    }
}

/// Aggregated outcome of a whole collection run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionSummary {
    /// The query that was collected.
    pub query: String,
    /// Per-engine task results, in engine order.
    pub results: Vec<CollectionResult>,
    /// Links found by all engines, deduplicated, before merging with the store.
    pub collected: usize,
    /// Links added to the store by this run.
    pub new_links: usize,
    /// Links in the store after the run.
    pub total_links: usize,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
}

impl CollectionSummary {
    /// Returns the number of engine tasks that failed.
    pub fn failed_engines(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_record_new() {
        let record = LinkRecord::new("Title");
        assert_eq!(record.title, "Title");
        assert!(record.description.is_none());
    }

    #[test]
    fn test_link_record_blank_description_dropped() {
        let record = LinkRecord::new("Title").with_description("   ");
        assert!(record.description.is_none());
        let record = LinkRecord::new("Title").with_description("snippet");
        assert_eq!(record.description.as_deref(), Some("snippet"));
    }

    #[test]
    fn test_link_record_serialization_omits_missing_description() {
        let json = serde_json::to_string(&LinkRecord::new("T")).unwrap();
        assert_eq!(json, r#"{"title":"T"}"#);
    }

    #[test]
    fn test_link_record_deserialization_without_description() {
        let record: LinkRecord = serde_json::from_str(r#"{"title":"T"}"#).unwrap();
        assert_eq!(record, LinkRecord::new("T"));
    }

    #[test]
    fn test_termination_reason_display_matches_serde() {
        for reason in [
            TerminationReason::MaxPagesReached,
            TerminationReason::NoMoreResults,
            TerminationReason::NavigationFailed,
            TerminationReason::UserAborted,
            TerminationReason::DeadlineExceeded,
            TerminationReason::Error,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason));
        }
    }

    #[test]
    fn test_collection_result_failed() {
        let result = CollectionResult::failed(EngineKind::Bing, TerminationReason::Error, "crashed");
        assert!(result.is_failure());
        assert_eq!(result.error.as_deref(), Some("crashed"));
        assert_eq!(result.pages_visited, 0);
    }

    #[test]
    fn test_collection_result_user_abort_is_not_failure() {
        let result = CollectionResult::new(EngineKind::Google, TerminationReason::UserAborted);
        assert!(!result.is_failure());
    }

    #[test]
    fn test_summary_failed_engines() {
        let summary = CollectionSummary {
            results: vec![
                CollectionResult::new(EngineKind::Google, TerminationReason::NoMoreResults),
                CollectionResult::failed(EngineKind::Bing, TerminationReason::NavigationFailed, "x"),
                CollectionResult::failed(EngineKind::Yandex, TerminationReason::Error, "y"),
            ],
            ..Default::default()
        };
        assert_eq!(summary.failed_engines(), 2);
    }
}
