//! License acquisition: exchanging a license document for the protected package.
//!
//! The [`LicenseService`] trait is the seam to the service that performs the
//! exchange. [`LicenseAcquisitionAdapter`] is what the pipeline talks to: it
//! decides whether an asset is a license document, calls the service, derives
//! the resulting media type from the suggested filename, and always removes
//! the license file afterwards.

mod lcpl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::download::DownloadError;
use crate::publication::{Asset, MediaType};

pub use lcpl::LcplLicenseService;

/// Outcome of a successful license exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredLicense {
    /// Local copy of the protected package.
    pub local_file: PathBuf,
    /// Filename the provider suggests; its extension carries the package type.
    pub suggested_filename: String,
}

/// Errors reported by a [`LicenseService`].
///
/// The display text is surfaced to the user unchanged.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The service refused the license (expired, revoked, ...).
    #[error("{0}")]
    Rejected(String),

    /// No license service is configured.
    #[error("license service is not available")]
    Unavailable,

    /// The license document could not be parsed.
    #[error("license document is not valid: {0}")]
    InvalidDocument(String),

    /// The license does not point at a publication.
    #[error("license has no publication link")]
    MissingPublicationLink,

    /// Downloading the protected publication failed.
    #[error("failed to download the protected publication: {0}")]
    Download(#[from] DownloadError),

    /// Embedding the license into the package failed.
    #[error("failed to package the protected publication: {0}")]
    Packaging(String),

    /// File system error.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl LicenseError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Exchanges a license document for the package it protects.
#[async_trait]
pub trait LicenseService: Send + Sync {
    /// Acquires the publication described by `license_file`.
    async fn acquire(&self, license_file: &Path) -> Result<AcquiredLicense, LicenseError>;
}

/// Service used when license support is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLicenseService;

#[async_trait]
impl LicenseService for UnavailableLicenseService {
    async fn acquire(&self, _license_file: &Path) -> Result<AcquiredLicense, LicenseError> {
        Err(LicenseError::Unavailable)
    }
}

/// Pipeline-facing wrapper around a [`LicenseService`].
#[derive(Clone)]
pub struct LicenseAcquisitionAdapter {
    service: Arc<dyn LicenseService>,
}

impl std::fmt::Debug for LicenseAcquisitionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseAcquisitionAdapter")
            .finish_non_exhaustive()
    }
}

impl LicenseAcquisitionAdapter {
    #[must_use]
    pub fn new(service: Arc<dyn LicenseService>) -> Self {
        Self { service }
    }

    #[must_use]
    pub fn is_license_document(asset: &Asset) -> bool {
        asset.media_type.is_license_document()
    }

    /// Exchanges `license` for the protected package.
    ///
    /// The license file is deleted whatever the outcome. The returned asset's
    /// media type comes from the suggested filename's extension, falling back
    /// to [`MediaType::Binary`] when the extension is unknown.
    ///
    /// # Errors
    ///
    /// Returns the service's [`LicenseError`] unchanged.
    #[instrument(skip(self, license), fields(path = %license.path.display()))]
    pub async fn acquire(&self, license: Asset) -> Result<Asset, LicenseError> {
        let outcome = self.service.acquire(&license.path).await;
        remove_license_file(&license.path).await;

        let acquired = outcome.inspect_err(|error| {
            debug!(error = %error, "license acquisition failed");
        })?;

        let media_type = MediaType::from_path(Path::new(&acquired.suggested_filename))
            .unwrap_or(MediaType::Binary);
        debug!(
            suggested_filename = %acquired.suggested_filename,
            media_type = %media_type,
            "license acquired"
        );
        Ok(Asset::new(acquired.local_file, media_type))
    }
}

async fn remove_license_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!(path = %path.display(), error = %error, "failed to remove license file"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedService {
        result: fn(&Path) -> Result<AcquiredLicense, LicenseError>,
    }

    #[async_trait]
    impl LicenseService for FixedService {
        async fn acquire(&self, license_file: &Path) -> Result<AcquiredLicense, LicenseError> {
            (self.result)(license_file)
        }
    }

    fn license_in(dir: &TempDir) -> Asset {
        let path = dir.path().join("book.lcpl");
        std::fs::write(&path, b"{}").unwrap();
        Asset::new(path, MediaType::LcpLicenseDocument)
    }

    #[test]
    fn test_is_license_document() {
        assert!(LicenseAcquisitionAdapter::is_license_document(&Asset::new(
            "/x.lcpl",
            MediaType::LcpLicenseDocument
        )));
        assert!(!LicenseAcquisitionAdapter::is_license_document(&Asset::new(
            "/x.epub",
            MediaType::Epub
        )));
    }

    #[tokio::test]
    async fn test_acquire_infers_media_type_from_suggested_filename() {
        let dir = TempDir::new().unwrap();
        let license = license_in(&dir);
        let package = dir.path().join("downloaded.bin");
        std::fs::write(&package, b"package").unwrap();
        let adapter = LicenseAcquisitionAdapter::new(Arc::new(FixedService {
            result: |license_file| {
                Ok(AcquiredLicense {
                    local_file: license_file.with_file_name("downloaded.bin"),
                    suggested_filename: "Some Title.lcpdf".to_string(),
                })
            },
        }));

        let asset = adapter.acquire(license.clone()).await.unwrap();

        assert_eq!(asset.media_type, MediaType::LcpProtectedPdf);
        assert_eq!(asset.path, package);
        assert!(!license.path.exists(), "license file must be removed");
    }

    #[tokio::test]
    async fn test_acquire_failure_removes_license_and_keeps_message() {
        let dir = TempDir::new().unwrap();
        let license = license_in(&dir);
        let adapter = LicenseAcquisitionAdapter::new(Arc::new(FixedService {
            result: |_| Err(LicenseError::Rejected("expired license".to_string())),
        }));

        let error = adapter.acquire(license.clone()).await.unwrap_err();

        assert_eq!(error.to_string(), "expired license");
        assert!(!license.path.exists());
    }

    #[tokio::test]
    async fn test_unavailable_service_reports_failure() {
        let dir = TempDir::new().unwrap();
        let adapter = LicenseAcquisitionAdapter::new(Arc::new(UnavailableLicenseService));

        let error = adapter.acquire(license_in(&dir)).await.unwrap_err();

        assert!(matches!(error, LicenseError::Unavailable));
    }
}
