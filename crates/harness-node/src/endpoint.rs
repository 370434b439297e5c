//! Connection parameters of a provisioned node.

use serde::{Deserialize, Serialize};

/// How a test process reaches its node.
///
/// Exposed on the lease and injected into the test process environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// JSON-RPC URL, e.g. `http://127.0.0.1:18500`.
    pub rpc_url: String,

    /// RPC username.
    pub rpc_user: String,

    /// RPC password.
    pub rpc_pass: String,

    /// P2P listening port.
    pub p2p_port: u16,
}

impl NodeEndpoint {
    /// Environment variables handed to the test process.
    pub fn env(&self) -> Vec<(String, String)> {
        vec![
            ("BITCOIND_RPC_URL".to_string(), self.rpc_url.clone()),
            ("BITCOIND_RPC_USER".to_string(), self.rpc_user.clone()),
            ("BITCOIND_RPC_PASS".to_string(), self.rpc_pass.clone()),
            ("BITCOIND_P2P_PORT".to_string(), self.p2p_port.to_string()),
        ]
    }
}
