//! Node provisioning configuration.
//!
//! All knobs are explicit construction-time values; nothing is read from
//! ambient process state inside the crate.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for spawning regtest bitcoind instances.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Path to the bitcoind executable.
    pub bitcoind_path: PathBuf,

    /// First RPC port; each started instance takes the next two-port
    /// stride (RPC + P2P).
    pub base_rpc_port: u16,

    /// RPC username passed to every instance.
    pub rpc_user: String,

    /// RPC password passed to every instance.
    pub rpc_pass: String,

    /// Extra arguments appended to every bitcoind invocation.
    pub extra_args: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bitcoind_path: PathBuf::from("bitcoind"),
            base_rpc_port: 18500,
            rpc_user: "harness".to_string(),
            rpc_pass: "harness".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Readiness-gating and retry policy for `acquire`.
///
/// The readiness deadline bounds provisioning only; the execution timeout
/// that bounds a hung test lives with the job runner.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Overall deadline for a started node to answer its health probe.
    pub readiness_timeout: Duration,

    /// Interval between health probes.
    pub probe_interval: Duration,

    /// Maximum number of start attempts per acquire (transient failures
    /// such as port contention are retried up to this bound).
    pub start_attempts: u32,

    /// Backoff between start attempts, scaled linearly by attempt number.
    pub retry_backoff: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_millis(250),
            start_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}
