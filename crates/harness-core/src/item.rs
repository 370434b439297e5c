//! WorkItem and manifest types produced by discovery.

use crate::{ItemId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sharding granularity for discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One WorkItem per test binary that contains at least one ignored test.
    #[default]
    PerBinary,
    /// One WorkItem per individual ignored test, with an exact name filter.
    PerTest,
}

/// Selection filter applied when the item's test binary is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFilter {
    /// Run tests marked `#[ignore]` (the external-resource class).
    pub ignored: bool,

    /// Optional test name pattern passed to the binary.
    pub name_pattern: Option<String>,

    /// Match the pattern exactly instead of as a substring.
    pub exact: bool,
}

impl TestFilter {
    /// Filter selecting every ignored test in a binary.
    pub fn all_ignored() -> Self {
        Self {
            ignored: true,
            name_pattern: None,
            exact: false,
        }
    }

    /// Filter selecting exactly one ignored test by name.
    pub fn exact_ignored(name: impl Into<String>) -> Self {
        Self {
            ignored: true,
            name_pattern: Some(name.into()),
            exact: true,
        }
    }

    /// Arguments to append to the test-binary invocation.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.ignored {
            args.push("--ignored".to_string());
        }
        if self.exact {
            args.push("--exact".to_string());
        }
        if let Some(pattern) = &self.name_pattern {
            args.push(pattern.clone());
        }
        args
    }
}

/// One independently schedulable integration-test unit.
///
/// Immutable once produced by discovery; consumed exactly once by a job
/// runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique item identifier.
    pub id: ItemId,

    /// Path to the compiled test binary.
    pub binary: PathBuf,

    /// Selection filter for this invocation.
    pub filter: TestFilter,
}

impl WorkItem {
    /// Create a new WorkItem for a binary with the given filter.
    pub fn new(binary: impl Into<PathBuf>, filter: TestFilter) -> Self {
        Self {
            id: ItemId::generate(),
            binary: binary.into(),
            filter,
        }
    }

    /// Human-readable label: binary stem plus pattern, if any.
    pub fn label(&self) -> String {
        let stem = self
            .binary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary.display().to_string());
        match &self.filter.name_pattern {
            Some(pattern) => format!("{}::{}", stem, pattern),
            None => stem,
        }
    }
}

/// The ordered, serializable sequence of WorkItems for one run.
///
/// This is the unit handed to a matrix dispatcher: every item in it is
/// self-sufficient and independently runnable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkManifest {
    /// Run identity shared by every item in this manifest.
    pub run_id: RunId,

    /// When discovery produced this manifest.
    pub created_at: DateTime<Utc>,

    /// The work items, in stable order.
    pub items: Vec<WorkItem>,
}

impl WorkManifest {
    /// Create a manifest with a fresh run identity.
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            run_id: RunId::generate(),
            created_at: Utc::now(),
            items,
        }
    }

    /// Number of work items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when discovery found nothing needing external resources.
    ///
    /// This is a deliberate, observable state distinct from discovery
    /// failure.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_args_all_ignored() {
        let filter = TestFilter::all_ignored();
        assert_eq!(filter.to_args(), vec!["--ignored".to_string()]);
    }

    #[test]
    fn test_filter_args_exact() {
        let filter = TestFilter::exact_ignored("integration_tests::two_of_five");
        assert_eq!(
            filter.to_args(),
            vec![
                "--ignored".to_string(),
                "--exact".to_string(),
                "integration_tests::two_of_five".to_string(),
            ]
        );
    }

    #[test]
    fn test_item_label() {
        let item = WorkItem::new(
            "/target/debug/deps/dlc_execution-abc123",
            TestFilter::exact_ignored("renew_contract"),
        );
        assert_eq!(item.label(), "dlc_execution-abc123::renew_contract");
    }

    #[test]
    fn test_manifest_round_trips_through_json() {
        let manifest = WorkManifest::new(vec![
            WorkItem::new("/bin/a", TestFilter::all_ignored()),
            WorkItem::new("/bin/b", TestFilter::exact_ignored("t1")),
        ]);
        let json = serde_json::to_string(&manifest).unwrap();
        let back: WorkManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
    }
}
