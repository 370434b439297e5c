//! JSON-RPC readiness probe.

use std::time::Duration;

use tracing::trace;

use crate::NodeEndpoint;

/// Per-request timeout; the overall readiness deadline is enforced by the
/// manager's poll loop, not here.
const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Probes a node's JSON-RPC interface with `getblockchaininfo`.
///
/// The node is considered healthy once the call returns an HTTP success;
/// a connection refusal, timeout, or 5xx all read as "not yet".
#[derive(Debug, Clone)]
pub struct RpcProbe {
    client: reqwest::Client,
}

impl RpcProbe {
    /// Create a probe with its own connection pool.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// One probe attempt against the given endpoint.
    pub async fn check(&self, endpoint: &NodeEndpoint) -> bool {
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": "regharness",
            "method": "getblockchaininfo",
            "params": [],
        });

        let result = self
            .client
            .post(&endpoint.rpc_url)
            .basic_auth(&endpoint.rpc_user, Some(&endpoint.rpc_pass))
            .timeout(PROBE_REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let healthy = response.status().is_success();
                trace!(url = %endpoint.rpc_url, status = %response.status(), healthy, "Probe response");
                healthy
            }
            Err(e) => {
                trace!(url = %endpoint.rpc_url, error = %e, "Probe failed");
                false
            }
        }
    }
}

impl Default for RpcProbe {
    fn default() -> Self {
        Self::new()
    }
}
