//! The acquisition pipeline.
//!
//! One call to [`AcquisitionPipeline::acquire`] turns a request into a
//! registered book:
//!
//! ```text
//! Local:  copy to scratch -> detect -> [license exchange] -> move into library
//!         -> open -> insert -> spawn cover task
//! Remote: resolve link -> download to scratch -> move into library
//!         -> insert catalog metadata -> spawn cover task
//! ```
//!
//! Every file created along the way is held in a [`PendingFile`] until the
//! catalog references it, so both error returns and a dropped future remove
//! it. The cover task is detached; the result never waits for it.

mod error;
mod request;

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::CatalogStore;
use crate::cover::{CoverExtractor, CoverWriter, PngCoverWriter, spawn_cover_task};
use crate::download::{CatalogDownloadAdapter, RemoteFetcher};
use crate::library::{AssetStore, PendingFile};
use crate::license::{LcplLicenseService, LicenseAcquisitionAdapter, LicenseService};
use crate::publication::{
    Asset, MediaType, Publication, PublicationOpener, Streamer, detect_media_type,
};

pub use error::AcquisitionError;
pub use request::AcquisitionRequest;

/// What to do with a library file whose catalog insert failed.
///
/// Manifest-only files are always retained regardless of this setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertFailurePolicy {
    /// Remove the file so the library holds only registered books.
    #[default]
    Delete,
    /// Leave the file in place and log its path.
    Retain,
}

/// A successfully registered publication.
#[derive(Debug)]
pub struct Acquired {
    pub book_id: i64,
    /// Reference stored in the catalog: a library path or the source URL.
    pub href: String,
    pub extension: String,
    /// The detached cover job. Dropping it does not cancel the job.
    pub cover_task: JoinHandle<()>,
}

/// Orchestrates acquisitions. Cheap to clone; clones share collaborators.
#[derive(Clone)]
pub struct AcquisitionPipeline {
    store: AssetStore,
    catalog: Arc<dyn CatalogStore>,
    downloads: CatalogDownloadAdapter,
    licenses: LicenseAcquisitionAdapter,
    opener: Arc<dyn PublicationOpener>,
    covers: CoverExtractor,
    cover_writer: Arc<dyn CoverWriter>,
    insert_failure_policy: InsertFailurePolicy,
}

impl std::fmt::Debug for AcquisitionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionPipeline")
            .field("store", &self.store)
            .field("insert_failure_policy", &self.insert_failure_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AcquisitionPipeline`].
///
/// Defaults: [`Streamer`] opener, [`LcplLicenseService`] downloading into the
/// scratch area, offline [`CoverExtractor`], [`PngCoverWriter`],
/// [`InsertFailurePolicy::Delete`].
pub struct AcquisitionPipelineBuilder {
    store: AssetStore,
    catalog: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn RemoteFetcher>,
    opener: Option<Arc<dyn PublicationOpener>>,
    license_service: Option<Arc<dyn LicenseService>>,
    covers: CoverExtractor,
    cover_writer: Option<Arc<dyn CoverWriter>>,
    insert_failure_policy: InsertFailurePolicy,
}

impl AcquisitionPipelineBuilder {
    #[must_use]
    pub fn opener(mut self, opener: Arc<dyn PublicationOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    #[must_use]
    pub fn license_service(mut self, service: Arc<dyn LicenseService>) -> Self {
        self.license_service = Some(service);
        self
    }

    #[must_use]
    pub fn cover_extractor(mut self, extractor: CoverExtractor) -> Self {
        self.covers = extractor;
        self
    }

    #[must_use]
    pub fn cover_writer(mut self, writer: Arc<dyn CoverWriter>) -> Self {
        self.cover_writer = Some(writer);
        self
    }

    #[must_use]
    pub fn insert_failure_policy(mut self, policy: InsertFailurePolicy) -> Self {
        self.insert_failure_policy = policy;
        self
    }

    #[must_use]
    pub fn build(self) -> AcquisitionPipeline {
        let scratch = self.store.scratch_dir().to_path_buf();
        let license_service = self.license_service.unwrap_or_else(|| {
            Arc::new(LcplLicenseService::new(
                Arc::clone(&self.fetcher),
                scratch.clone(),
            ))
        });

        AcquisitionPipeline {
            downloads: CatalogDownloadAdapter::new(self.fetcher, scratch),
            licenses: LicenseAcquisitionAdapter::new(license_service),
            opener: self.opener.unwrap_or_else(|| Arc::new(Streamer::new())),
            cover_writer: self.cover_writer.unwrap_or_else(|| Arc::new(PngCoverWriter)),
            store: self.store,
            catalog: self.catalog,
            covers: self.covers,
            insert_failure_policy: self.insert_failure_policy,
        }
    }
}

impl AcquisitionPipeline {
    /// Starts a builder with the three collaborators every pipeline needs.
    #[must_use]
    pub fn builder(
        store: AssetStore,
        catalog: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> AcquisitionPipelineBuilder {
        AcquisitionPipelineBuilder {
            store,
            catalog,
            fetcher,
            opener: None,
            license_service: None,
            covers: CoverExtractor::offline(),
            cover_writer: None,
            insert_failure_policy: InsertFailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Runs one acquisition to completion.
    ///
    /// Returns as soon as the catalog insert finishes; the cover thumbnail is
    /// produced by the detached task in [`Acquired::cover_task`].
    ///
    /// # Errors
    ///
    /// Returns the [`AcquisitionError`] of the first failing step. Files the
    /// run created are gone by then, except a manifest-only library file,
    /// which is kept when its source URL is missing or its insert fails.
    #[instrument(skip_all, fields(mode = request.mode()))]
    pub async fn acquire(&self, request: AcquisitionRequest) -> Result<Acquired, AcquisitionError> {
        let outcome = match request {
            AcquisitionRequest::Local {
                source_uri,
                source_url,
            } => self.acquire_local(&source_uri, source_url.as_deref()).await,
            AcquisitionRequest::Remote { publication } => self.acquire_remote(*publication).await,
        };

        match &outcome {
            Ok(acquired) => info!(
                book_id = acquired.book_id,
                href = %acquired.href,
                extension = %acquired.extension,
                "publication acquired"
            ),
            Err(error) => warn!(error = %error, "acquisition failed"),
        }
        outcome
    }

    async fn acquire_local(
        &self,
        source_uri: &str,
        source_url: Option<&str>,
    ) -> Result<Acquired, AcquisitionError> {
        let copy = self
            .store
            .copy_to_scratch(source_uri)
            .await
            .map_err(AcquisitionError::CopyFailed)?;
        let scratch = PendingFile::new(copy);
        let detected = Asset::new(
            scratch.path(),
            detect_media_type(scratch.path(), None).await,
        );
        debug!(media_type = %detected.media_type, "detected source type");

        let (pending, asset) = if LicenseAcquisitionAdapter::is_license_document(&detected) {
            let acquired = self.licenses.acquire(detected).await.map_err(|e| {
                AcquisitionError::AcquisitionFailed {
                    message: e.to_string(),
                }
            })?;
            drop(scratch);
            (PendingFile::new(&acquired.path), acquired)
        } else {
            (scratch, detected)
        };

        let media_type = asset.media_type;
        let destination = self.store.generate_library_path(media_type);
        let moved = self
            .store
            .move_into_library(asset, &destination)
            .await
            .map_err(AcquisitionError::MoveFailed)?;
        let _moved_from = pending.keep();
        let library_file = PendingFile::new(&moved.path);

        let extension = media_type
            .file_extension()
            .or_else(|| moved.file_extension())
            .unwrap_or_default()
            .to_string();

        let href = if media_type.is_manifest_only() {
            let Some(url) = source_url else {
                error!(
                    path = %moved.path.display(),
                    "manifest-only publication has no source URL; leaving file in place"
                );
                let _retained = library_file.keep();
                return Err(AcquisitionError::MissingSourceUrl);
            };
            url.to_string()
        } else {
            path_href(&moved.path)
        };

        let publication = self.opener.open(&moved, false).await.map_err(|e| {
            AcquisitionError::OpenFailed {
                message: e.to_string(),
            }
        })?;

        let book_id = self
            .insert(&href, &extension, &publication, library_file, media_type)
            .await?;
        Ok(self.finish(book_id, href, extension, publication))
    }

    async fn acquire_remote(&self, publication: Publication) -> Result<Acquired, AcquisitionError> {
        let url = CatalogDownloadAdapter::resolve_download_url(&publication)
            .ok_or(AcquisitionError::NoDownloadLink)?;
        let fetched = self
            .downloads
            .fetch_to_temp(&url)
            .await
            .map_err(AcquisitionError::DownloadFailed)?;
        let download = PendingFile::new(&fetched.path);

        let destination = self.store.generate_library_path(MediaType::Epub);
        let moved = self
            .store
            .move_into_library(fetched, &destination)
            .await
            .map_err(AcquisitionError::MoveFailed)?;
        let _moved_from = download.keep();
        let library_file = PendingFile::new(&moved.path);

        let href = path_href(&moved.path);
        let extension = MediaType::Epub
            .file_extension()
            .unwrap_or_default()
            .to_string();
        let book_id = self
            .insert(&href, &extension, &publication, library_file, MediaType::Epub)
            .await?;
        Ok(self.finish(book_id, href, extension, publication))
    }

    /// Registers the book and settles the library file's fate.
    async fn insert(
        &self,
        href: &str,
        extension: &str,
        publication: &Publication,
        library_file: PendingFile,
        media_type: MediaType,
    ) -> Result<i64, AcquisitionError> {
        match self.catalog.insert_book(href, extension, publication).await {
            Ok(book_id) => {
                if media_type.is_manifest_only() {
                    // The catalog points at the source URL, not the local copy.
                    library_file.discard();
                } else {
                    let _registered = library_file.keep();
                }
                Ok(book_id)
            }
            Err(source) => {
                if source.is_ignored_insert() {
                    warn!(href, "catalog already holds this href; insert ignored");
                } else {
                    warn!(href, error = %source, "catalog insert failed");
                }
                let retain = media_type.is_manifest_only()
                    || self.insert_failure_policy == InsertFailurePolicy::Retain;
                if retain {
                    let path = library_file.keep();
                    warn!(path = %path.display(), "catalog insert failed; file left in library");
                }
                Err(AcquisitionError::DatabaseInsertFailed(source))
            }
        }
    }

    fn finish(
        &self,
        book_id: i64,
        href: String,
        extension: String,
        publication: Publication,
    ) -> Acquired {
        let cover_task = spawn_cover_task(
            self.covers.clone(),
            Arc::clone(&self.cover_writer),
            self.store.clone(),
            book_id,
            publication,
        );
        Acquired {
            book_id,
            href,
            extension,
            cover_task,
        }
    }
}

fn path_href(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
