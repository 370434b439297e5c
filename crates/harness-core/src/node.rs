//! Node lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one provisioned node instance.
///
/// Success path: `Unstarted → Starting → Ready → InUse → Stopping → Stopped`.
/// `Unhealthy` is reachable from `Starting` or `Ready` on probe failure or
/// readiness-deadline exhaustion; its only exit is a forced `Stopping`,
/// which releases the same underlying resources as the success path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// No process exists yet.
    #[default]
    Unstarted,
    /// Process spawned, readiness not yet confirmed.
    Starting,
    /// Health probe succeeded; node accepts RPC calls.
    Ready,
    /// Lent to a job runner for one work item.
    InUse,
    /// Health probe failed or readiness deadline exhausted.
    Unhealthy,
    /// Teardown in progress.
    Stopping,
    /// Terminal: process reaped, resources reclaimed.
    Stopped,
}

impl NodeState {
    /// Returns true if the transition `self → next` is legal.
    pub fn can_transition(&self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Unstarted, Starting)
                | (Starting, Ready)
                | (Starting, Unhealthy)
                | (Ready, InUse)
                | (Ready, Unhealthy)
                | (Ready, Stopping)
                | (InUse, Stopping)
                | (Unhealthy, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Returns true if the node holds external resources that must still
    /// be reclaimed.
    pub fn holds_resources(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Ready | Self::InUse | Self::Unhealthy | Self::Stopping
        )
    }

    /// Returns true if the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unstarted => "unstarted",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::InUse => "in-use",
            Self::Unhealthy => "unhealthy",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}
