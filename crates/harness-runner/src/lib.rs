//! Work item execution.
//!
//! A [`JobRunner`] consumes one work item: it acquires a ready node
//! lease, executes the test binary with the node's connection parameters
//! injected, applies the execution timeout, classifies the outcome, and
//! releases the lease on every exit path. The [`WorkerPool`] fans items
//! out over a bounded number of concurrent runners and supports
//! run-level cancellation.

mod classify;
mod error;
mod pool;
mod runner;

#[cfg(test)]
pub(crate) mod testutil;

pub use classify::classify_exit;
pub use error::RunnerError;
pub use pool::WorkerPool;
pub use runner::JobRunner;
