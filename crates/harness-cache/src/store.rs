//! Filesystem-backed artifact store.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::CacheKey;

/// Cache storage errors. A `get` on an absent key is a miss, not an
/// error; these cover real I/O failures only.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Artifact to store does not exist or has no file name.
    #[error("Invalid artifact path: {0}")]
    InvalidArtifact(PathBuf),

    /// Filesystem failure while reading or writing the store.
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Content-addressed store: one directory per key digest, holding the
/// cached binary under its original file name.
#[derive(Debug, Clone)]
pub struct BinaryCache {
    root: PathBuf,
}

impl BinaryCache {
    /// Open (or create) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Look up the artifact for `key`. Exact digest equality only.
    pub fn get(&self, key: &CacheKey) -> Result<Option<PathBuf>, CacheError> {
        let slot = self.slot(key);
        if !slot.is_dir() {
            debug!(digest = %key.digest(), "Cache miss");
            return Ok(None);
        }
        let mut entries =
            std::fs::read_dir(&slot).map_err(|source| CacheError::Io {
                path: slot.clone(),
                source,
            })?;
        match entries.next() {
            Some(entry) => {
                let path = entry
                    .map_err(|source| CacheError::Io {
                        path: slot,
                        source,
                    })?
                    .path();
                debug!(artifact = %path.display(), "Cache hit");
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    /// Store `artifact` under `key`.
    ///
    /// The copy goes through a staging file unique to this writer and is
    /// renamed into place, so a crashed writer never leaves a servable
    /// half-artifact and concurrent writers of the same key (sibling
    /// matrix shards populating a shared cache) cannot scribble into a
    /// published binary. Last writer wins; both wrote the same bytes.
    pub fn put(&self, key: &CacheKey, artifact: &Path) -> Result<PathBuf, CacheError> {
        let file_name = artifact
            .file_name()
            .ok_or_else(|| CacheError::InvalidArtifact(artifact.to_path_buf()))?;

        let slot = self.slot(key);
        std::fs::create_dir_all(&slot).map_err(|source| CacheError::Io {
            path: slot.clone(),
            source,
        })?;

        let mut source_file = std::fs::File::open(artifact).map_err(|source| CacheError::Io {
            path: artifact.to_path_buf(),
            source,
        })?;
        let permissions = source_file
            .metadata()
            .map_err(|source| CacheError::Io {
                path: artifact.to_path_buf(),
                source,
            })?
            .permissions();

        let mut staging =
            tempfile::NamedTempFile::new_in(&self.root).map_err(|source| CacheError::Io {
                path: self.root.clone(),
                source,
            })?;
        std::io::copy(&mut source_file, staging.as_file_mut()).map_err(|source| {
            CacheError::Io {
                path: staging.path().to_path_buf(),
                source,
            }
        })?;
        // Binaries must stay executable once served from the cache.
        staging
            .as_file()
            .set_permissions(permissions)
            .map_err(|source| CacheError::Io {
                path: staging.path().to_path_buf(),
                source,
            })?;

        let target = slot.join(file_name);
        staging.persist(&target).map_err(|e| CacheError::Io {
            path: target.clone(),
            source: e.error,
        })?;

        info!(digest = %key.digest(), artifact = %target.display(), "Cached artifact");
        Ok(target)
    }

    fn slot(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_core::RunId;
    use std::io::Write;

    fn key(pin: &str) -> CacheKey {
        CacheKey::new(pin, "1.75.0", RunId::new("run-1"))
    }

    fn write_artifact(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_put_then_get_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinaryCache::new(dir.path().join("cache")).unwrap();
        let artifact = write_artifact(dir.path(), "tests-abc", b"elf");

        cache.put(&key("secp256k1-sys 0.4.1"), &artifact).unwrap();
        let hit = cache.get(&key("secp256k1-sys 0.4.1")).unwrap().unwrap();
        assert_eq!(hit.file_name().unwrap(), "tests-abc");
        assert_eq!(std::fs::read(hit).unwrap(), b"elf");
    }

    #[test]
    fn test_mismatched_pin_always_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinaryCache::new(dir.path().join("cache")).unwrap();
        let artifact = write_artifact(dir.path(), "tests-abc", b"elf");

        cache.put(&key("secp256k1-sys 0.4.1"), &artifact).unwrap();
        assert!(cache.get(&key("secp256k1-sys 0.4.2")).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_put_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache = BinaryCache::new(dir.path().join("cache")).unwrap();
        let artifact = write_artifact(dir.path(), "tests-abc", b"elf");
        std::fs::set_permissions(&artifact, std::fs::Permissions::from_mode(0o755)).unwrap();

        cache.put(&key("secp256k1-sys 0.4.1"), &artifact).unwrap();
        let hit = cache.get(&key("secp256k1-sys 0.4.1")).unwrap().unwrap();
        let mode = std::fs::metadata(hit).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[test]
    fn test_get_on_empty_cache_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinaryCache::new(dir.path().join("cache")).unwrap();
        assert!(cache.get(&key("secp256k1-sys 0.4.1")).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_puts_never_corrupt_served_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinaryCache::new(dir.path().join("cache")).unwrap();

        // Two shards racing to populate the same key, same file name,
        // different (equal-length) bytes.
        let first = write_artifact(dir.path(), "tests-abc", b"GOOD_ARTIFACT_BYTES");
        let sibling_dir = dir.path().join("sibling");
        std::fs::create_dir(&sibling_dir).unwrap();
        let second = write_artifact(&sibling_dir, "tests-abc", b"XXXX_ARTIFACT_BYTES");

        let writers: Vec<_> = [first, second]
            .into_iter()
            .map(|artifact| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        cache.put(&key("secp256k1-sys 0.4.1"), &artifact).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let served = cache.get(&key("secp256k1-sys 0.4.1")).unwrap().unwrap();
        let bytes = std::fs::read(served).unwrap();
        assert!(
            bytes == b"GOOD_ARTIFACT_BYTES" || bytes == b"XXXX_ARTIFACT_BYTES",
            "served artifact is a torn mix of two writers: {:?}",
            String::from_utf8_lossy(&bytes)
        );
    }

    #[test]
    fn test_put_rejects_directory_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BinaryCache::new(dir.path().join("cache")).unwrap();
        let err = cache.put(&key("p"), Path::new("/")).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArtifact(_)));
    }
}
