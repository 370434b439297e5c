//! Exit-status classification.

use harness_core::RunStatus;
use std::process::ExitStatus;

/// Map a completed test process to its outcome.
///
/// Exit 0 is a pass; any other exit code is a test failure (libtest exits
/// non-zero on assertion failure); termination without an exit code
/// (killed by signal) is an infrastructure error.
pub fn classify_exit(status: ExitStatus) -> (RunStatus, Option<i32>) {
    if status.success() {
        return (RunStatus::Passed, Some(0));
    }
    match status.code() {
        Some(code) => (RunStatus::Failed, Some(code)),
        None => (RunStatus::Errored, None),
    }
}
