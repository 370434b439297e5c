//! Composite cache key.

use harness_core::RunId;
use sha2::{Digest, Sha256};

/// Identity of one cached artifact: dependency pin + toolchain + run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Exact pinned version of the native dependency the tests were
    /// built against (e.g. `secp256k1-sys 0.4.1`).
    pub pin_version: String,

    /// Toolchain identity (e.g. `1.75.0-x86_64-unknown-linux-gnu`).
    pub toolchain: String,

    /// Run identity from the manifest.
    pub run_id: RunId,
}

impl CacheKey {
    /// Create a key for the given pin, toolchain, and run.
    pub fn new(
        pin_version: impl Into<String>,
        toolchain: impl Into<String>,
        run_id: RunId,
    ) -> Self {
        Self {
            pin_version: pin_version.into(),
            toolchain: toolchain.into(),
            run_id,
        }
    }

    /// Hex digest addressing this key's slot in the store.
    ///
    /// Components are length-prefixed so no two distinct keys can
    /// collide by concatenation.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [self.pin_version.as_str(), self.toolchain.as_str(), self.run_id.as_str()] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = CacheKey::new("secp256k1-sys 0.4.1", "1.75.0", RunId::new("run-1"));
        let b = CacheKey::new("secp256k1-sys 0.4.1", "1.75.0", RunId::new("run-1"));
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_pin_version_changes_digest() {
        let a = CacheKey::new("secp256k1-sys 0.4.1", "1.75.0", RunId::new("run-1"));
        let b = CacheKey::new("secp256k1-sys 0.4.2", "1.75.0", RunId::new("run-1"));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_component_boundaries_matter() {
        // "ab" + "c" must not collide with "a" + "bc".
        let a = CacheKey::new("ab", "c", RunId::new("r"));
        let b = CacheKey::new("a", "bc", RunId::new("r"));
        assert_ne!(a.digest(), b.digest());
    }
}
