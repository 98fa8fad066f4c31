//! Remote download seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use super::client::{DownloadedFile, HttpClient};
use super::error::DownloadError;
use crate::library::PendingFile;
use crate::publication::{MediaType, detect_media_type};

/// A remote resource saved locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub media_type: MediaType,
}

/// Fetches remote bytes into a directory.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Downloads `url` into a new file inside `directory`.
    async fn fetch(&self, url: &Url, directory: &Path) -> Result<FetchedFile, DownloadError>;
}

#[async_trait]
impl RemoteFetcher for HttpClient {
    async fn fetch(&self, url: &Url, directory: &Path) -> Result<FetchedFile, DownloadError> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| DownloadError::io(directory, e))?;

        let destination = directory.join(file_name_for(url));
        let downloaded = self.download_to_path(url.as_str(), &destination).await?;
        Ok(classify(downloaded).await)
    }
}

/// Detects the media type of a finished download. The file is removed if
/// this is cancelled before detection returns.
async fn classify(downloaded: DownloadedFile) -> FetchedFile {
    let pending = PendingFile::new(downloaded.path);
    let media_type = detect_media_type(pending.path(), downloaded.content_type.as_deref()).await;
    FetchedFile {
        path: pending.keep(),
        media_type,
    }
}

/// `<uuid>` plus the URL path's extension, if it has one.
fn file_name_for(url: &Url) -> String {
    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| Path::new(last).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match extension {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}
