//! Error types for library directory operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`AssetStore`](super::AssetStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error at a known path.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being read, written or created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Relocating a file into the library failed; the source is untouched.
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        /// File being moved.
        from: PathBuf,
        /// Intended destination.
        to: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Source reference is neither a path nor a `file://` URI.
    #[error("unsupported source URI: {uri}")]
    UnsupportedUri {
        /// The rejected reference.
        uri: String,
    },
}

impl StoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a move error.
    pub fn move_failed(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Move {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Creates an unsupported-URI error.
    pub fn unsupported_uri(uri: impl Into<String>) -> Self {
        Self::UnsupportedUri { uri: uri.into() }
    }
}
