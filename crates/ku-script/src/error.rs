//! Error types for loading scripts.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for script loading.
pub type ScriptLoadResult<T> = Result<T, ScriptLoadError>;

/// Errors that prevent a script from being loaded at all.
///
/// Malformed lines are not errors here; they become diagnostics on the
/// parsed [`Script`](crate::Script).
#[derive(Debug, Error)]
pub enum ScriptLoadError {
    /// The script file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The script has no labels, so there is nowhere to start.
    #[error("{} defines no labels", .0.display())]
    NoLabels(PathBuf),
}
