//! Status classification for executed work items.

use serde::{Deserialize, Serialize};

/// Outcome classification of one WorkItem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Test process exited 0.
    Passed,
    /// Test process ran to completion with a non-zero exit code
    /// (assertion failure).
    Failed,
    /// Abnormal termination: spawn failure, killed by signal, or the run
    /// was cancelled. Indicates environment rather than code defect.
    Errored,
    /// Test process exceeded its execution timeout and was killed.
    TimedOut,
    /// The item never ran: its node failed to start or to become healthy
    /// within the readiness deadline.
    Provisioning,
}

impl RunStatus {
    /// Returns true if the outcome is a test verdict rather than an
    /// infrastructure event.
    pub fn is_verdict(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }

    /// Returns true if the outcome indicates an infrastructure problem
    /// that deserves operator attention.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Errored | Self::TimedOut | Self::Provisioning)
    }

    /// Returns true if this outcome alone makes the whole run fail.
    pub fn fails_run(&self) -> bool {
        !matches!(self, Self::Passed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::TimedOut => "timed-out",
            Self::Provisioning => "provisioning",
        };
        write!(f, "{}", s)
    }
}
