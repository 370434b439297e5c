//! Run results and the aggregated run report.

use crate::{ItemId, RunId, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one WorkItem execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// The item this result belongs to.
    pub item_id: ItemId,

    /// The run this item was executed under.
    pub run_id: RunId,

    /// Human-readable label of the item (binary stem plus pattern).
    pub label: String,

    /// Outcome classification.
    pub status: RunStatus,

    /// Exit code of the test process, when it exited normally.
    pub exit_code: Option<i32>,

    /// Captured stdout of the test process.
    pub stdout: String,

    /// Captured stderr of the test process.
    pub stderr: String,

    /// Error message for infrastructure outcomes.
    pub message: Option<String>,

    /// When execution of this item started.
    pub started_at: DateTime<Utc>,

    /// When this result was produced.
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Result for an item whose node could not be provisioned.
    pub fn provisioning_failure(
        item_id: ItemId,
        run_id: RunId,
        label: impl Into<String>,
        started_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            run_id,
            label: label.into(),
            status: RunStatus::Provisioning,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message: Some(message.into()),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Result for an item that failed before or outside test execution.
    pub fn infrastructure_error(
        item_id: ItemId,
        run_id: RunId,
        label: impl Into<String>,
        started_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            run_id,
            label: label.into(),
            status: RunStatus::Errored,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message: Some(message.into()),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Aggregated view over all results of one run.
///
/// The run is green iff discovery succeeded and every item passed; a test
/// failure fails the run but is reported separately from infrastructure
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Items that passed.
    pub passed: usize,

    /// Items whose tests failed.
    pub failed: usize,

    /// Items with abnormal termination.
    pub errored: usize,

    /// Items killed by the execution timeout.
    pub timed_out: usize,

    /// Items whose node never became ready.
    pub provisioning: usize,
}

impl RunReport {
    /// Build a report from a sequence of results, in any order.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a RunResult>) -> Self {
        let mut report = Self::default();
        for result in results {
            report.record(result.status);
        }
        report
    }

    /// Record one outcome.
    pub fn record(&mut self, status: RunStatus) {
        match status {
            RunStatus::Passed => self.passed += 1,
            RunStatus::Failed => self.failed += 1,
            RunStatus::Errored => self.errored += 1,
            RunStatus::TimedOut => self.timed_out += 1,
            RunStatus::Provisioning => self.provisioning += 1,
        }
    }

    /// Total number of items recorded.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored + self.timed_out + self.provisioning
    }

    /// True when every item passed.
    pub fn success(&self) -> bool {
        self.total() == self.passed
    }

    /// True when some failure came from the environment rather than from
    /// test assertions.
    pub fn has_infrastructure_failure(&self) -> bool {
        self.errored + self.timed_out + self.provisioning > 0
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} errored, {} timed-out, {} provisioning failures",
            self.passed, self.failed, self.errored, self.timed_out, self.provisioning
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(status: RunStatus) -> RunResult {
        RunResult {
            item_id: ItemId::generate(),
            run_id: RunId::new("run"),
            label: "bin::test".into(),
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_counts_and_success() {
        let results = vec![
            result_with(RunStatus::Passed),
            result_with(RunStatus::Passed),
            result_with(RunStatus::Failed),
        ];
        let report = RunReport::from_results(&results);
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.success());
        assert!(!report.has_infrastructure_failure());
    }

    #[test]
    fn test_provisioning_is_infrastructure_failure() {
        let results = vec![
            result_with(RunStatus::Passed),
            result_with(RunStatus::Provisioning),
        ];
        let report = RunReport::from_results(&results);
        assert!(!report.success());
        assert!(report.has_infrastructure_failure());
    }

    #[test]
    fn test_all_passed_is_success() {
        let results = vec![result_with(RunStatus::Passed)];
        assert!(RunReport::from_results(&results).success());
    }
}
