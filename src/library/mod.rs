//! Managed library directory layout.
//!
//! ```text
//! <root>/
//!   <uuid>.<ext>        acquired publications
//!   covers/<id>.png     cover thumbnails, keyed by catalog id
//! <scratch>/
//!   <uuid>.<ext>        copies and downloads awaiting inspection
//! ```
//!
//! Filenames are random v4 UUIDs, so concurrent acquisitions never collide
//! and no locking is needed for placement.

mod error;
mod pending;

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::publication::{Asset, MediaType};

pub use error::StoreError;
pub use pending::PendingFile;

/// Name of the cover thumbnail subdirectory.
pub const COVERS_DIR: &str = "covers";

/// Scratch directory name used when none is configured.
pub const DEFAULT_SCRATCH_DIR: &str = ".scratch";

/// Library and scratch directories for one application instance.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    scratch: PathBuf,
}

impl AssetStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scratch: scratch.into(),
        }
    }

    /// Store whose scratch area lives inside the library root.
    #[must_use]
    pub fn with_default_scratch(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let scratch = root.join(DEFAULT_SCRATCH_DIR);
        Self { root, scratch }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    /// Creates the library and scratch directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if either directory cannot be created.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        create_dir(&self.root).await?;
        create_dir(&self.scratch).await
    }

    /// Collision-free destination inside the library for a file of `media_type`.
    #[must_use]
    pub fn generate_library_path(&self, media_type: MediaType) -> PathBuf {
        self.root.join(unique_file_name(media_type.file_extension()))
    }

    /// Fresh scratch location with the given extension.
    #[must_use]
    pub fn scratch_path(&self, extension: Option<&str>) -> PathBuf {
        self.scratch.join(unique_file_name(extension))
    }

    #[must_use]
    pub fn cover_path(&self, book_id: i64) -> PathBuf {
        self.root.join(COVERS_DIR).join(format!("{book_id}.png"))
    }

    /// Creates `<root>/covers/` if absent and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn ensure_cover_dir(&self) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(COVERS_DIR);
        create_dir(&dir).await?;
        Ok(dir)
    }

    /// Moves `asset` to `destination`.
    ///
    /// Uses a rename, falling back to copy-then-remove when the scratch area
    /// and the library sit on different file systems. On failure the source
    /// file is left intact and no partial destination remains.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Move`] if the file could not be relocated.
    #[instrument(skip(self, asset), fields(from = %asset.path.display(), to = %destination.display()))]
    pub async fn move_into_library(
        &self,
        asset: Asset,
        destination: &Path,
    ) -> Result<Asset, StoreError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::move_failed(&asset.path, destination, e))?;
        }

        match tokio::fs::rename(&asset.path, destination).await {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::CrossesDevices => {
                debug!("rename crosses devices, copying instead");
                copy_then_remove(&asset.path, destination).await?;
            }
            Err(error) => return Err(StoreError::move_failed(&asset.path, destination, error)),
        }

        debug!("moved into library");
        Ok(Asset::new(destination, asset.media_type))
    }

    /// Copies the content behind `source_uri` into the scratch area.
    ///
    /// Accepts plain filesystem paths and `file://` URIs. The copy keeps the
    /// source's extension so extension-based detection still works.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedUri`] for other schemes, or
    /// [`StoreError::Io`] if reading the source or writing the copy fails.
    #[instrument(skip(self))]
    pub async fn copy_to_scratch(&self, source_uri: &str) -> Result<PathBuf, StoreError> {
        let source = resolve_source(source_uri)?;
        create_dir(&self.scratch).await?;

        let extension = source.extension().and_then(|ext| ext.to_str());
        let destination = PendingFile::new(self.scratch_path(extension));
        tokio::fs::copy(&source, destination.path())
            .await
            .map_err(|e| StoreError::io(&source, e))?;

        debug!(copy = %destination.path().display(), "copied source to scratch");
        Ok(destination.keep())
    }
}

fn unique_file_name(extension: Option<&str>) -> String {
    let id = Uuid::new_v4();
    match extension.filter(|ext| !ext.is_empty()) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

fn resolve_source(source_uri: &str) -> Result<PathBuf, StoreError> {
    if source_uri.starts_with("file:") {
        let url = Url::parse(source_uri).map_err(|_| StoreError::unsupported_uri(source_uri))?;
        return url
            .to_file_path()
            .map_err(|()| StoreError::unsupported_uri(source_uri));
    }
    if let Ok(url) = Url::parse(source_uri)
        && url.scheme().len() > 1
    {
        // Single-letter schemes are Windows drive letters, not URIs.
        return Err(StoreError::unsupported_uri(source_uri));
    }
    Ok(PathBuf::from(source_uri))
}

async fn create_dir(dir: &Path) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))
}

async fn copy_then_remove(from: &Path, to: &Path) -> Result<(), StoreError> {
    let partial = PendingFile::new(to);
    tokio::fs::copy(from, partial.path())
        .await
        .map_err(|e| StoreError::move_failed(from, to, e))?;
    let _placed = partial.keep();

    if let Err(error) = tokio::fs::remove_file(from).await {
        warn!(path = %from.display(), error = %error, "copied into library but could not remove source");
    }
    Ok(())
}
