//! Shared fakes for runner and pool tests.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use harness_core::NodeId;
use harness_node::{NodeEndpoint, NodeError, NodeManager, NodeProvider, ReadinessConfig};

/// Provider scripted per started instance: the n-th started node is
/// healthy iff `health[n]` (the last entry repeats). Records start/stop
/// counts and the concurrent high-water mark.
pub(crate) struct ScriptedProvider {
    health: Vec<bool>,
    instance_health: Mutex<HashMap<NodeId, bool>>,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    running_now: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(health: Vec<bool>) -> Self {
        assert!(!health.is_empty());
        Self {
            health,
            instance_health: Mutex::new(HashMap::new()),
            started: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
            running_now: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NodeProvider for ScriptedProvider {
    async fn start(&self) -> Result<(NodeId, NodeEndpoint), NodeError> {
        let index = self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.running_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        let healthy = *self.health.get(index).unwrap_or_else(|| {
            self.health.last().expect("health script is non-empty")
        });
        let id = NodeId::generate();
        self.instance_health.lock().unwrap().insert(id.clone(), healthy);

        let endpoint = NodeEndpoint {
            rpc_url: format!("http://127.0.0.1:{}", 18500 + index),
            rpc_user: "harness".into(),
            rpc_pass: "harness".into(),
            p2p_port: 18600 + index as u16,
        };
        Ok((id, endpoint))
    }

    async fn healthcheck(&self, id: &NodeId) -> bool {
        self.instance_health
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(false)
    }

    async fn stop(&self, id: &NodeId) -> Result<(), NodeError> {
        if self.instance_health.lock().unwrap().remove(id).is_some() {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            self.running_now.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// A manager over a scripted provider with test-speed timeouts.
pub(crate) fn fast_manager(health: Vec<bool>) -> (Arc<ScriptedProvider>, Arc<NodeManager>) {
    let provider = Arc::new(ScriptedProvider::new(health));
    let cfg = ReadinessConfig {
        readiness_timeout: Duration::from_millis(50),
        probe_interval: Duration::from_millis(5),
        start_attempts: 2,
        retry_backoff: Duration::from_millis(1),
    };
    let manager = Arc::new(NodeManager::new(provider.clone(), cfg));
    (provider, manager)
}

/// Write an executable shell script standing in for a test binary.
pub(crate) fn fake_test_binary(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{}", body).unwrap();
    drop(file);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}
