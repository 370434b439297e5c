//! The node process collaborator seam and its bitcoind implementation.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use harness_core::NodeId;

use crate::{NodeConfig, NodeEndpoint, NodeError, RpcProbe};

/// External-service collaborator: start, probe, stop.
///
/// `stop` must be safely callable on an already-stopped or never-fully-
/// started instance; providers treat an unknown id as already stopped.
#[async_trait]
pub trait NodeProvider: Send + Sync {
    /// Start a fresh instance. Returns its id and connection parameters.
    async fn start(&self) -> Result<(NodeId, NodeEndpoint), NodeError>;

    /// One health probe against a running instance.
    async fn healthcheck(&self, id: &NodeId) -> bool;

    /// Stop an instance and reclaim its resources. Idempotent.
    async fn stop(&self, id: &NodeId) -> Result<(), NodeError>;
}

/// One running bitcoind child plus the resources tied to its lifetime.
struct RunningNode {
    child: Child,
    endpoint: NodeEndpoint,
    // Held so the datadir outlives the process; dropped on stop.
    _datadir: TempDir,
}

/// Spawns regtest bitcoind instances, one per `start` call, each with an
/// ephemeral data directory and its own RPC/P2P port pair.
pub struct BitcoindProvider {
    cfg: NodeConfig,
    probe: RpcProbe,
    port_seq: AtomicU16,
    running: Mutex<HashMap<NodeId, RunningNode>>,
}

impl BitcoindProvider {
    /// Create a provider for the given node configuration.
    pub fn new(cfg: NodeConfig) -> Self {
        Self {
            cfg,
            probe: RpcProbe::new(),
            port_seq: AtomicU16::new(0),
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next RPC/P2P port pair.
    fn next_ports(&self) -> (u16, u16) {
        let offset = self.port_seq.fetch_add(2, Ordering::Relaxed);
        let rpc = self.cfg.base_rpc_port.wrapping_add(offset);
        (rpc, rpc.wrapping_add(1))
    }
}

#[async_trait]
impl NodeProvider for BitcoindProvider {
    async fn start(&self) -> Result<(NodeId, NodeEndpoint), NodeError> {
        let (rpc_port, p2p_port) = self.next_ports();
        let datadir = TempDir::with_prefix("regharness-node-")?;

        let mut cmd = Command::new(&self.cfg.bitcoind_path);
        cmd.arg("-regtest")
            .arg(format!("-datadir={}", datadir.path().display()))
            .arg("-server=1")
            .arg("-listen=1")
            .arg(format!("-rpcport={}", rpc_port))
            .arg(format!("-port={}", p2p_port))
            .arg(format!("-rpcuser={}", self.cfg.rpc_user))
            .arg(format!("-rpcpassword={}", self.cfg.rpc_pass))
            .arg("-fallbackfee=0.0001")
            .args(&self.cfg.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // Backstop only; the normal path reaps through `stop`.
            .kill_on_drop(true);

        debug!(rpc_port, p2p_port, "Spawning bitcoind");
        let child = cmd.spawn()?;

        let id = NodeId::generate();
        let endpoint = NodeEndpoint {
            rpc_url: format!("http://127.0.0.1:{}", rpc_port),
            rpc_user: self.cfg.rpc_user.clone(),
            rpc_pass: self.cfg.rpc_pass.clone(),
            p2p_port,
        };

        info!(node = %id, rpc_port, "Started bitcoind instance");
        self.running.lock().await.insert(
            id.clone(),
            RunningNode {
                child,
                endpoint: endpoint.clone(),
                _datadir: datadir,
            },
        );

        Ok((id, endpoint))
    }

    async fn healthcheck(&self, id: &NodeId) -> bool {
        let endpoint = {
            let running = self.running.lock().await;
            match running.get(id) {
                Some(node) => node.endpoint.clone(),
                None => return false,
            }
        };
        self.probe.check(&endpoint).await
    }

    async fn stop(&self, id: &NodeId) -> Result<(), NodeError> {
        let node = self.running.lock().await.remove(id);
        let Some(mut node) = node else {
            debug!(node = %id, "Stop on unknown or already-stopped instance");
            return Ok(());
        };

        if let Err(e) = node.child.start_kill() {
            // Already exited; still reap below.
            debug!(node = %id, error = %e, "Kill signal not delivered");
        }
        match node.child.wait().await {
            Ok(status) => info!(node = %id, status = %status, "Stopped bitcoind instance"),
            Err(e) => warn!(node = %id, error = %e, "Failed to reap bitcoind"),
        }
        // Dropping the node removes its ephemeral datadir.
        Ok(())
    }
}
