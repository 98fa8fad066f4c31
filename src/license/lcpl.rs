//! LCP license documents (`.lcpl`).
//!
//! Acquisition downloads the publication the license links to and stores the
//! license inside the package at `META-INF/license.lcpl`, which is where
//! reading systems look for it.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{AcquiredLicense, LicenseError, LicenseService};
use crate::download::RemoteFetcher;
use crate::library::PendingFile;
use crate::publication::{Link, MediaType};

/// Location of the license inside a protected package.
const LICENSE_ENTRY: &str = "META-INF/license.lcpl";

/// The parts of a license document acquisition needs.
#[derive(Debug, Deserialize)]
struct LicenseDocument {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

/// License service that fetches the linked publication and embeds the license.
pub struct LcplLicenseService {
    fetcher: Arc<dyn RemoteFetcher>,
    work_dir: PathBuf,
}

impl std::fmt::Debug for LcplLicenseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LcplLicenseService")
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}

impl LcplLicenseService {
    /// Downloads go to `work_dir`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl LicenseService for LcplLicenseService {
    #[instrument(skip(self), fields(license = %license_file.display()))]
    async fn acquire(&self, license_file: &Path) -> Result<AcquiredLicense, LicenseError> {
        let license = tokio::fs::read(license_file)
            .await
            .map_err(|e| LicenseError::io(license_file, e))?;
        let document: LicenseDocument = serde_json::from_slice(&license)
            .map_err(|e| LicenseError::InvalidDocument(e.to_string()))?;

        let link = document
            .links
            .iter()
            .find(|link| link.has_rel("publication"))
            .ok_or(LicenseError::MissingPublicationLink)?;
        let url = Url::parse(&link.href)
            .map_err(|e| LicenseError::InvalidDocument(format!("publication link: {e}")))?;
        debug!(license_id = %document.id, url = %url, "fetching protected publication");

        let fetched = self.fetcher.fetch(&url, &self.work_dir).await?;
        let package = PendingFile::new(&fetched.path);

        let package_path = package.path().to_path_buf();
        tokio::task::spawn_blocking(move || embed_license(&package_path, &license))
            .await
            .map_err(|e| LicenseError::Packaging(e.to_string()))??;

        let media_type = link
            .media_type
            .as_deref()
            .and_then(MediaType::from_mime)
            .filter(|media_type| !media_type.is_generic())
            .unwrap_or(fetched.media_type);
        let suggested_filename = match media_type.file_extension() {
            Some(extension) => format!("{}.{extension}", document.id),
            None => document.id.clone(),
        };

        info!(license_id = %document.id, %suggested_filename, "protected publication ready");
        Ok(AcquiredLicense {
            local_file: package.keep(),
            suggested_filename,
        })
    }
}

/// Rewrites the zip at `package` with `license` stored as [`LICENSE_ENTRY`].
///
/// Existing entries are raw-copied in order, so a leading `mimetype` entry
/// stays first and uncompressed.
fn embed_license(package: &Path, license: &[u8]) -> Result<(), LicenseError> {
    let rewritten = PendingFile::new(package.with_extension("lcp-part"));
    {
        let source = File::open(package).map_err(|e| LicenseError::io(package, e))?;
        let mut archive = ZipArchive::new(BufReader::new(source))
            .map_err(|e| LicenseError::Packaging(format!("publication is not a zip package: {e}")))?;
        let target =
            File::create(rewritten.path()).map_err(|e| LicenseError::io(rewritten.path(), e))?;
        let mut writer = ZipWriter::new(target);

        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| LicenseError::Packaging(e.to_string()))?;
            if entry.name() == LICENSE_ENTRY {
                continue;
            }
            writer
                .raw_copy_file(entry)
                .map_err(|e| LicenseError::Packaging(e.to_string()))?;
        }

        writer
            .start_file(
                LICENSE_ENTRY,
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            )
            .map_err(|e| LicenseError::Packaging(e.to_string()))?;
        writer
            .write_all(license)
            .map_err(|e| LicenseError::io(rewritten.path(), e))?;
        writer
            .finish()
            .map_err(|e| LicenseError::Packaging(e.to_string()))?;
    }

    std::fs::rename(rewritten.path(), package).map_err(|e| LicenseError::io(package, e))?;
    let _replaced = rewritten.keep();
    Ok(())
}
