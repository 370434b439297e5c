//! Discovery errors. All of them abort the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while enumerating test artifacts.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The artifact directory could not be read.
    #[error("Failed to read artifact directory {dir}: {source}")]
    ArtifactDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A test binary could not be spawned for listing.
    #[error("Failed to spawn {binary} for listing: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A test binary exited non-zero in listing mode.
    #[error("Listing {binary} exited with status {code}: {stderr}")]
    Listing {
        binary: PathBuf,
        code: i32,
        stderr: String,
    },

    /// Listing output was not valid libtest terse format.
    #[error("Unparseable listing line from {binary}: {line:?}")]
    Unparseable { binary: PathBuf, line: String },
}
