//! Acquire/release over the provider seam, with readiness gating.

use std::fmt;
use std::sync::Arc;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use harness_core::{CoreError, NodeId, NodeState};

use crate::{NodeEndpoint, NodeError, NodeProvider, ReadinessConfig};

/// An exclusive lease on one ready node.
///
/// The lease moves into exactly one job runner; exclusivity is structural,
/// not locked. Release is explicit and must run on every exit path; a
/// lease dropped without release is a leak and is logged as one (the
/// provider's kill-on-drop backstop still reclaims the process).
pub struct NodeLease {
    id: NodeId,
    endpoint: NodeEndpoint,
    state: NodeState,
    provider: Arc<dyn NodeProvider>,
    released: bool,
}

impl NodeLease {
    fn new(id: NodeId, endpoint: NodeEndpoint, provider: Arc<dyn NodeProvider>) -> Self {
        Self {
            id,
            endpoint,
            state: NodeState::Ready,
            provider,
            released: false,
        }
    }

    /// The node instance this lease covers.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Connection parameters for the test process.
    pub fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Mark the node as lent out for execution.
    ///
    /// Only legal from `Ready`; a lease is lent out at most once.
    pub fn mark_in_use(&mut self) -> Result<(), CoreError> {
        if !self.state.can_transition(NodeState::InUse) {
            return Err(CoreError::InvalidStateTransition {
                from: self.state.to_string(),
                to: NodeState::InUse.to_string(),
            });
        }
        self.state = NodeState::InUse;
        Ok(())
    }

    /// Stop the node and reclaim its resources.
    ///
    /// Consumes the lease; safe regardless of the node's actual health.
    pub async fn release(mut self) -> Result<(), NodeError> {
        self.state = NodeState::Stopping;
        self.released = true;
        let result = self.provider.stop(&self.id).await;
        self.state = NodeState::Stopped;
        debug!(node = %self.id, "Lease released");
        result
    }
}

impl fmt::Debug for NodeLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeLease")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for NodeLease {
    fn drop(&mut self) {
        if !self.released {
            warn!(node = %self.id, state = %self.state, "Node lease dropped without release");
        }
    }
}

/// Starts nodes through the provider and gates acquisition on readiness.
pub struct NodeManager {
    provider: Arc<dyn NodeProvider>,
    cfg: ReadinessConfig,
}

impl NodeManager {
    /// Create a manager over the given provider.
    pub fn new(provider: Arc<dyn NodeProvider>, cfg: ReadinessConfig) -> Self {
        Self { provider, cfg }
    }

    /// Start a fresh node and block until it is ready, within bounds.
    ///
    /// Transient start failures are retried up to the configured attempt
    /// count with linear backoff. A node that starts but never answers
    /// its probe within the readiness deadline is force-stopped and the
    /// acquisition fails; a ready lease is never handed out for an
    /// unhealthy node.
    pub async fn acquire(&self) -> Result<NodeLease, NodeError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let (id, endpoint) = match self.provider.start().await {
                Ok(started) => started,
                Err(e) if attempt < self.cfg.start_attempts => {
                    warn!(attempt, error = %e, "Node start failed; retrying");
                    sleep(self.cfg.retry_backoff * attempt).await;
                    continue;
                }
                Err(e) => {
                    return Err(NodeError::StartFailed {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            };

            debug!(node = %id, state = %NodeState::Starting, "Awaiting readiness");
            if self.wait_ready(&id).await {
                info!(node = %id, state = %NodeState::Ready, "Node ready");
                return Ok(NodeLease::new(id, endpoint, self.provider.clone()));
            }

            // Unhealthy: forced teardown releases the same resources as
            // the success path.
            warn!(node = %id, state = %NodeState::Unhealthy, "Readiness deadline exhausted");
            if let Err(e) = self.provider.stop(&id).await {
                warn!(node = %id, error = %e, "Cleanup of unhealthy node failed");
            }
            return Err(NodeError::Unhealthy {
                id,
                deadline_secs: self.cfg.readiness_timeout.as_secs(),
            });
        }
    }

    /// Poll the health probe until success or deadline exhaustion.
    async fn wait_ready(&self, id: &NodeId) -> bool {
        let deadline = Instant::now() + self.cfg.readiness_timeout;
        loop {
            if self.provider.healthcheck(id).await {
                return true;
            }
            if Instant::now() + self.cfg.probe_interval > deadline {
                return false;
            }
            sleep(self.cfg.probe_interval).await;
        }
    }
}
