//! Test discovery and sharding.
//!
//! Enumerates the ignored (external-resource) tests inside compiled test
//! binaries by invoking libtest's listing mode, then shards them into
//! independently runnable [`WorkItem`]s. Discovery never executes a test;
//! it only lists. A binary that cannot be listed is fatal to the whole
//! run so that "zero items" is always a deliberate state, never a
//! fallback from error.
//!
//! [`WorkItem`]: harness_core::WorkItem

mod discover;
mod error;
mod listing;

pub use discover::Discovery;
pub use error::DiscoveryError;
pub use listing::parse_terse_listing;
