//! Discovery driver: list artifacts, shard into work items.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use harness_core::{Granularity, TestFilter, WorkItem, WorkManifest};

use crate::listing::parse_terse_listing;
use crate::DiscoveryError;

/// Discovery produces the WorkManifest for one run.
#[derive(Debug, Clone)]
pub struct Discovery {
    granularity: Granularity,
}

impl Discovery {
    /// Create a Discovery with the given sharding granularity.
    pub fn new(granularity: Granularity) -> Self {
        Self { granularity }
    }

    /// Scan an artifact directory for compiled test binaries.
    ///
    /// Output is sorted so that repeated scans of the same directory
    /// produce the same artifact order.
    pub fn collect_artifacts(&self, dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
        let entries = std::fs::read_dir(dir).map_err(|source| DiscoveryError::ArtifactDir {
            dir: dir.to_path_buf(),
            source,
        })?;

        let mut binaries = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DiscoveryError::ArtifactDir {
                dir: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if is_test_binary(&path) {
                binaries.push(path);
            }
        }
        binaries.sort();
        debug!(dir = %dir.display(), count = binaries.len(), "Collected test artifacts");
        Ok(binaries)
    }

    /// Enumerate ignored tests in the given binaries and shard them.
    ///
    /// Any binary that cannot be listed aborts discovery; no partial
    /// manifest is ever produced. An empty manifest is a valid result and
    /// is logged as such.
    pub async fn discover(&self, binaries: &[PathBuf]) -> Result<WorkManifest, DiscoveryError> {
        let mut items = Vec::new();

        for binary in binaries {
            let tests = self.list_ignored(binary).await?;
            if tests.is_empty() {
                debug!(binary = %binary.display(), "No ignored tests");
                continue;
            }
            match self.granularity {
                Granularity::PerBinary => {
                    info!(
                        binary = %binary.display(),
                        tests = tests.len(),
                        "Sharding binary as one work item"
                    );
                    items.push(WorkItem::new(binary.clone(), TestFilter::all_ignored()));
                }
                Granularity::PerTest => {
                    info!(
                        binary = %binary.display(),
                        tests = tests.len(),
                        "Sharding binary per test"
                    );
                    for name in tests {
                        items.push(WorkItem::new(binary.clone(), TestFilter::exact_ignored(name)));
                    }
                }
            }
        }

        if items.is_empty() {
            warn!("Discovery found no ignored tests; manifest is empty");
        }

        Ok(WorkManifest::new(items))
    }

    /// Run one binary in listing mode and return its ignored test names,
    /// sorted.
    async fn list_ignored(&self, binary: &Path) -> Result<Vec<String>, DiscoveryError> {
        let output = Command::new(binary)
            .args(["--list", "--format", "terse", "--ignored"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| DiscoveryError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(DiscoveryError::Listing {
                binary: binary.to_path_buf(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut names = parse_terse_listing(binary, &stdout)?;
        names.sort();
        Ok(names)
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new(Granularity::PerBinary)
    }
}

/// Heuristic for "this file is a runnable test binary".
///
/// Cargo drops `.d` dep-info files and metadata next to the binaries in
/// `target/*/deps`; anything with an extension is not the executable.
fn is_test_binary(path: &Path) -> bool {
    if !path.is_file() || path.extension().is_some() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match path.metadata() {
            Ok(meta) => meta.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        true
    }
}
