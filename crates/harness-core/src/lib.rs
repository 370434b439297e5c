//! Regharness Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Process spawning
//! - Network/RPC
//! - Runtime specifics
//!
//! All types here represent the core domain of the integration-test
//! harness: work items produced by discovery, node lifecycle states,
//! and run results consumed by reporting.

pub mod error;
pub mod ids;
pub mod item;
pub mod node;
pub mod result;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{ItemId, NodeId, RunId};
pub use item::{Granularity, TestFilter, WorkItem, WorkManifest};
pub use node::NodeState;
pub use result::{RunReport, RunResult};
pub use status::RunStatus;
