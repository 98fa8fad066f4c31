//! Drop guard for files that are not yet owned by the catalog.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A file that is deleted when the guard drops, unless [`keep`](Self::keep) is called.
///
/// Acquisition stages hold one of these for every file they create. Failure
/// paths and cancelled tasks (a dropped future) both end in `Drop`, so neither
/// leaves the file behind. Deleting an already-missing file is not an error.
#[derive(Debug)]
#[must_use = "dropping a PendingFile deletes the file"]
pub struct PendingFile {
    path: PathBuf,
    armed: bool,
}

impl PendingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the guard; the file stays where it is.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Deletes the file now.
    pub fn discard(self) {
        drop(self);
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed pending file"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "failed to remove pending file");
            }
        }
    }
}
