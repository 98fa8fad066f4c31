//! Cover thumbnails.
//!
//! After a publication is registered, its cover is resolved, scaled to a
//! fixed 120×200 thumbnail and written to `<library>/covers/<book id>.png`.
//! This runs as a detached task: the acquisition result never waits on it
//! and cover failures are only logged.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use url::Url;

use crate::download::{DownloadError, HttpClient};
use crate::library::{AssetStore, PendingFile, StoreError};
use crate::publication::{Publication, read_entry};

/// Thumbnail width in pixels.
pub const COVER_WIDTH: u32 = 120;
/// Thumbnail height in pixels.
pub const COVER_HEIGHT: u32 = 200;
/// Largest source image accepted for a thumbnail.
pub const MAX_COVER_BYTES: u64 = 20 * 1024 * 1024;

/// Errors raised while producing a cover thumbnail.
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("failed to decode cover image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode cover image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("failed to fetch cover: {0}")]
    Fetch(#[from] DownloadError),

    #[error("cannot resolve cover href {href}")]
    UnresolvedHref { href: String },

    #[error("cover at {href} exceeds {limit} bytes")]
    TooLarge { href: String, limit: u64 },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cover task failed: {0}")]
    Task(String),
}

impl CoverError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn unresolved(href: &str) -> Self {
        Self::UnresolvedHref {
            href: href.to_string(),
        }
    }

    fn too_large(href: &str) -> Self {
        Self::TooLarge {
            href: href.to_string(),
            limit: MAX_COVER_BYTES,
        }
    }
}

/// Resolves the raw cover image of a publication.
#[derive(Debug, Clone, Default)]
pub struct CoverExtractor {
    http: Option<HttpClient>,
}

impl CoverExtractor {
    /// Extractor that fetches remote covers with `http`.
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http: Some(http) }
    }

    /// Extractor that only reads embedded and local covers.
    #[must_use]
    pub fn offline() -> Self {
        Self { http: None }
    }

    /// Raw cover bytes, or `None` when the publication has no usable cover.
    ///
    /// Looks at the embedded cover first, then the link tagged `cover`, then
    /// the first gallery image.
    #[instrument(skip_all)]
    pub async fn extract(&self, publication: &Publication) -> Option<Vec<u8>> {
        if let Some(bytes) = &publication.cover {
            return Some(bytes.clone());
        }

        let link = publication
            .cover_link()
            .or_else(|| publication.images.first())?;
        match self.load(publication, &link.href).await {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                debug!(href = %link.href, error = %error, "cover not loadable");
                None
            }
        }
    }

    /// Remote hrefs go over HTTP. Local ones are only honoured for
    /// publications opened from a package on disk: relative and `/`-rooted
    /// hrefs address package entries, `file://` URIs are read directly.
    async fn load(&self, publication: &Publication, href: &str) -> Result<Vec<u8>, CoverError> {
        let package = publication.package_path();
        if let Ok(url) = Url::parse(href) {
            match url.scheme() {
                "http" | "https" => {
                    let http = self.http.as_ref().ok_or_else(|| CoverError::unresolved(href))?;
                    return Ok(http.fetch_bytes(href, MAX_COVER_BYTES).await?);
                }
                "file" if package.is_some() => {
                    let path = url
                        .to_file_path()
                        .map_err(|()| CoverError::unresolved(href))?;
                    return read_file(&path, href).await;
                }
                // Single-letter schemes are drive letters.
                scheme if scheme.len() > 1 => return Err(CoverError::unresolved(href)),
                _ => {}
            }
        }

        let package = package
            .ok_or_else(|| CoverError::unresolved(href))?
            .to_path_buf();
        let entry = href.to_string();
        tokio::task::spawn_blocking(move || read_package_entry(&package, &entry))
            .await
            .map_err(|e| CoverError::Task(e.to_string()))?
    }
}

async fn read_file(path: &Path, href: &str) -> Result<Vec<u8>, CoverError> {
    let length = tokio::fs::metadata(path)
        .await
        .map_err(|e| CoverError::io(path, e))?
        .len();
    if length > MAX_COVER_BYTES {
        return Err(CoverError::too_large(href));
    }
    tokio::fs::read(path)
        .await
        .map_err(|e| CoverError::io(path, e))
}

fn read_package_entry(package: &Path, href: &str) -> Result<Vec<u8>, CoverError> {
    let file = File::open(package).map_err(|e| CoverError::io(package, e))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|_| CoverError::unresolved(href))?;
    let name = href.trim_start_matches("./").trim_start_matches('/');
    let size = archive
        .by_name(name)
        .map_err(|_| CoverError::unresolved(href))?
        .size();
    if size > MAX_COVER_BYTES {
        return Err(CoverError::too_large(href));
    }
    read_entry(&mut archive, href).ok_or_else(|| CoverError::unresolved(href))
}

/// Decodes `bytes` and scales to exactly [`COVER_WIDTH`]×[`COVER_HEIGHT`].
///
/// The aspect ratio is not preserved.
///
/// # Errors
///
/// Returns [`CoverError::Decode`] if the bytes are not a supported image.
pub fn resize(bytes: &[u8]) -> Result<DynamicImage, CoverError> {
    let image = image::load_from_memory(bytes).map_err(CoverError::Decode)?;
    Ok(image.resize_exact(COVER_WIDTH, COVER_HEIGHT, FilterType::Triangle))
}

/// Encodes `image` as PNG.
///
/// # Errors
///
/// Returns [`CoverError::Encode`] if encoding fails.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CoverError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(CoverError::Encode)?;
    Ok(buffer.into_inner())
}

/// Persists thumbnails.
#[async_trait]
pub trait CoverWriter: Send + Sync {
    /// Writes `image` to `destination`.
    async fn store(&self, image: DynamicImage, destination: &Path) -> Result<(), CoverError>;
}

/// Writes PNG files via a temporary name and a rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCoverWriter;

#[async_trait]
impl CoverWriter for PngCoverWriter {
    async fn store(&self, image: DynamicImage, destination: &Path) -> Result<(), CoverError> {
        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| CoverError::Task(e.to_string()))??;

        let partial = PendingFile::new(destination.with_extension("png.part"));
        tokio::fs::write(partial.path(), &png)
            .await
            .map_err(|e| CoverError::io(partial.path(), e))?;
        tokio::fs::rename(partial.path(), destination)
            .await
            .map_err(|e| CoverError::io(destination, e))?;
        let _renamed = partial.keep();
        Ok(())
    }
}

/// Starts the detached thumbnail job for `book_id`.
///
/// The returned handle may be dropped; the task keeps running and logs its
/// own outcome.
pub fn spawn_cover_task(
    extractor: CoverExtractor,
    writer: Arc<dyn CoverWriter>,
    store: AssetStore,
    book_id: i64,
    publication: Publication,
) -> JoinHandle<()> {
    let span = info_span!("cover", book_id);
    tokio::spawn(
        async move {
            match store_cover(&extractor, writer.as_ref(), &store, book_id, &publication).await {
                Ok(Some(path)) => info!(path = %path.display(), "cover stored"),
                Ok(None) => debug!("publication has no cover"),
                Err(error) => warn!(error = %error, "failed to store cover"),
            }
        }
        .instrument(span),
    )
}

async fn store_cover(
    extractor: &CoverExtractor,
    writer: &dyn CoverWriter,
    store: &AssetStore,
    book_id: i64,
    publication: &Publication,
) -> Result<Option<PathBuf>, CoverError> {
    let Some(bytes) = extractor.extract(publication).await else {
        return Ok(None);
    };
    let thumbnail = tokio::task::spawn_blocking(move || resize(&bytes))
        .await
        .map_err(|e| CoverError::Task(e.to_string()))??;

    store.ensure_cover_dir().await?;
    let destination = store.cover_path(book_id);
    writer.store(thumbnail, &destination).await?;
    Ok(Some(destination))
}
