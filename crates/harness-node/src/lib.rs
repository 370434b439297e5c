//! Node lifecycle management.
//!
//! Provisions one regtest bitcoind instance per work item, gates on its
//! readiness through a bounded JSON-RPC probe loop, and guarantees that
//! every started instance is stopped exactly once. The external node is
//! reached only through the [`NodeProvider`] seam, so tests substitute a
//! scripted fake for the real daemon.

mod config;
mod endpoint;
mod error;
mod manager;
mod probe;
mod provider;

pub use config::{NodeConfig, ReadinessConfig};
pub use endpoint::NodeEndpoint;
pub use error::NodeError;
pub use manager::{NodeLease, NodeManager};
pub use probe::RpcProbe;
pub use provider::{BitcoindProvider, NodeProvider};
