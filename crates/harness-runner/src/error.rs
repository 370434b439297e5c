//! Runner errors.
//!
//! These never escape `JobRunner::run`; they are classified into the
//! item's result so one broken item cannot take down the run.

use thiserror::Error;

/// Infrastructure failures while executing a test process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The test binary could not be spawned.
    #[error("Failed to spawn test process: {0}")]
    Spawn(std::io::Error),

    /// Waiting on the test process failed.
    #[error("Failed to await test process: {0}")]
    Wait(std::io::Error),
}
