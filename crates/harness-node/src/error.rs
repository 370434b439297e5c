//! Node lifecycle errors.

use harness_core::NodeId;
use thiserror::Error;

/// Errors raised while provisioning or tearing down a node instance.
///
/// Every variant aborts one work item, never the whole run.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node process could not be started within the retry bound.
    #[error("Node failed to start after {attempts} attempts: {reason}")]
    StartFailed { attempts: u32, reason: String },

    /// The node started but never answered its health probe within the
    /// readiness deadline.
    #[error("Node {id} did not become healthy within {deadline_secs}s")]
    Unhealthy { id: NodeId, deadline_secs: u64 },

    /// I/O error while managing the node process or its data directory.
    #[error("Node I/O error: {0}")]
    Io(#[from] std::io::Error),
}
