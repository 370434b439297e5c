//! Compiled test-binary cache keyed by run identity.
//!
//! Repeated matrix shards of the same run reuse one build instead of
//! recompiling. Lookup is exact-digest only: a key whose pinned
//! dependency version differs in any way is a different key, so a stale
//! binary built against another pin can never be served. No eviction;
//! the key space is bounded by run identity.

mod key;
mod store;

pub use key::CacheKey;
pub use store::{BinaryCache, CacheError};
