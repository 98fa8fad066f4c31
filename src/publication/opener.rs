//! Format service: turns an asset on disk into a [`Publication`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rbook::Epub;
use rbook::prelude::*;
use thiserror::Error;
use tracing::{debug, instrument};

use super::{Asset, Link, MediaType, Metadata as PublicationMetadata, Publication};

/// Errors raised while opening a publication.
#[derive(Debug, Error)]
pub enum OpenError {
    /// No parser handles this media type.
    #[error("unsupported publication format: {media_type}")]
    UnsupportedFormat {
        /// The rejected type.
        media_type: MediaType,
    },

    /// The publication is protected and unlocking it needs the user.
    #[error("the publication is protected and cannot be opened without user interaction")]
    InteractionRequired,

    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being opened.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File was read but its content is invalid.
    #[error("invalid publication {path}: {message}")]
    Parse {
        /// File being opened.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}

impl OpenError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Opens assets as structured publications.
#[async_trait]
pub trait PublicationOpener: Send + Sync {
    /// Parses `asset`.
    ///
    /// Background callers pass `allow_user_interaction = false`; formats that
    /// would need to prompt (e.g. for a passphrase) fail instead.
    async fn open(
        &self,
        asset: &Asset,
        allow_user_interaction: bool,
    ) -> Result<Publication, OpenError>;
}

/// Opener for the formats the library understands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Streamer;

impl Streamer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublicationOpener for Streamer {
    #[instrument(skip(self, asset), fields(path = %asset.path.display(), media_type = %asset.media_type))]
    async fn open(
        &self,
        asset: &Asset,
        allow_user_interaction: bool,
    ) -> Result<Publication, OpenError> {
        let media_type = asset.media_type;
        let path = asset.path.clone();

        let opened = match media_type {
            MediaType::LcpProtectedPdf if !allow_user_interaction => {
                return Err(OpenError::InteractionRequired);
            }
            MediaType::Epub => blocking(path, open_epub).await?,
            MediaType::ReadiumWebPub | MediaType::ReadiumAudiobook | MediaType::Divina => {
                blocking(path, open_packaged_manifest).await?
            }
            MediaType::ReadiumWebPubManifest
            | MediaType::ReadiumAudiobookManifest
            | MediaType::DivinaManifest => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| OpenError::io(&path, e))?;
                serde_json::from_slice::<Publication>(&bytes)
                    .map_err(|e| OpenError::parse(&path, e.to_string()))?
            }
            MediaType::Cbz => blocking(path, open_cbz).await?,
            MediaType::Pdf => pdf_publication(&path),
            other => return Err(OpenError::UnsupportedFormat { media_type: other }),
        };

        debug!(
            title = opened.metadata.title.as_deref().unwrap_or("<untitled>"),
            has_cover = opened.cover.is_some(),
            "publication opened"
        );
        Ok(opened)
    }
}

async fn blocking(
    path: PathBuf,
    open: fn(&Path) -> Result<Publication, OpenError>,
) -> Result<Publication, OpenError> {
    let for_error = path.clone();
    tokio::task::spawn_blocking(move || open(&path))
        .await
        .map_err(|e| OpenError::parse(for_error, format!("parser task failed: {e}")))?
}

fn open_epub(path: &Path) -> Result<Publication, OpenError> {
    let epub = Epub::options()
        .strict(false)
        .open(path)
        .map_err(|e| OpenError::parse(path, e.to_string()))?;

    let metadata = epub.metadata();
    let mut authors = Vec::new();
    for creator in metadata.creators() {
        authors.push(creator.value().to_string());
    }

    let manifest = epub.manifest();
    let cover = manifest
        .cover_image()
        .and_then(|entry| entry.read_bytes().ok());
    let images = manifest
        .images()
        .filter_map(|entry| entry.resource().key().value().map(Link::new))
        .collect();

    Ok(Publication {
        metadata: PublicationMetadata {
            identifier: metadata.identifier().map(|id| id.value().to_string()),
            title: metadata.title().map(|t| t.value().to_string()),
            authors,
            language: metadata.languages().next().map(|l| l.value().to_string()),
            publisher: metadata.publishers().next().map(|p| p.value().to_string()),
            description: metadata.descriptions().next().map(|d| d.value().to_string()),
        },
        images,
        cover,
        package: Some(path.to_path_buf()),
        ..Publication::default()
    })
}

fn open_packaged_manifest(path: &Path) -> Result<Publication, OpenError> {
    let mut archive = open_archive(path)?;
    let mut publication: Publication = {
        let entry = archive
            .by_name("manifest.json")
            .map_err(|e| OpenError::parse(path, format!("missing manifest.json: {e}")))?;
        serde_json::from_reader(entry).map_err(|e| OpenError::parse(path, e.to_string()))?
    };

    if let Some(cover_href) = publication.cover_link().map(|link| link.href.clone()) {
        publication.cover = read_entry(&mut archive, &cover_href);
    }
    publication.package = Some(path.to_path_buf());
    Ok(publication)
}

fn open_cbz(path: &Path) -> Result<Publication, OpenError> {
    let mut archive = open_archive(path)?;
    let mut pages: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .filter(|name| {
            MediaType::from_path(Path::new(name)).is_some_and(|t| t.mime().starts_with("image/"))
        })
        .map(str::to_owned)
        .collect();
    pages.sort();

    let cover = pages
        .first()
        .cloned()
        .and_then(|first| read_entry(&mut archive, &first));

    Ok(Publication {
        metadata: PublicationMetadata {
            title: title_from_file_stem(path),
            ..PublicationMetadata::default()
        },
        reading_order: pages.into_iter().map(Link::new).collect(),
        cover,
        package: Some(path.to_path_buf()),
        ..Publication::default()
    })
}

fn pdf_publication(path: &Path) -> Publication {
    Publication {
        metadata: PublicationMetadata {
            title: title_from_file_stem(path),
            ..PublicationMetadata::default()
        },
        reading_order: vec![
            Link::new(path.display().to_string()).with_type(MediaType::Pdf.mime()),
        ],
        package: Some(path.to_path_buf()),
        ..Publication::default()
    }
}

fn title_from_file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
}

fn open_archive(path: &Path) -> Result<zip::ZipArchive<BufReader<File>>, OpenError> {
    let file = File::open(path).map_err(|e| OpenError::io(path, e))?;
    zip::ZipArchive::new(BufReader::new(file)).map_err(|e| OpenError::parse(path, e.to_string()))
}

/// Reads a package entry addressed by a manifest-relative href.
pub(crate) fn read_entry<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    href: &str,
) -> Option<Vec<u8>> {
    let name = href.trim_start_matches("./").trim_start_matches('/');
    let mut entry = archive.by_name(name).ok()?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).ok()?;
    Some(bytes)
}
