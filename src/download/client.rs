//! HTTP client wrapper for fetching catalog resources.
//!
//! This module provides the `HttpClient` struct which handles streaming
//! downloads with proper timeout configuration and error handling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::library::PendingFile;
use crate::user_agent;

/// HTTP client for downloading files with streaming support.
///
/// Create once and share; clones reuse the same connection pool.
///
/// # Example
///
/// ```no_run
/// use acquirer_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let file = client
///     .download_to_path("https://example.com/book.epub", Path::new("/tmp/book.epub"))
///     .await?;
/// println!("Downloaded {} bytes", file.bytes);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// Result of a completed download.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Where the body was written.
    pub path: PathBuf,
    /// Body size in bytes.
    pub bytes: u64,
    /// Response `Content-Type`, when present.
    pub content_type: Option<String>,
}

impl HttpClient {
    /// Creates a client with the default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large packages)
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend or system
    /// configuration cannot be initialized.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the client cannot be built.
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Streams the body at `url` into `destination`.
    ///
    /// A partially written file is removed on any error, including when the
    /// returned future is dropped mid-transfer.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - Writing to disk fails
    #[must_use = "download result contains the path and content type"]
    #[instrument(skip(self, destination), fields(url = %url, path = %destination.display()))]
    pub async fn download_to_path(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<DownloadedFile, DownloadError> {
        debug!("starting download");
        let response = self.send(url).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let partial = PendingFile::new(destination);
        let mut file = File::create(partial.path())
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        let bytes = stream_to_file(&mut file, response, url, destination).await?;
        let path = partial.keep();

        info!(bytes, content_type = content_type.as_deref().unwrap_or("-"), "download complete");
        Ok(DownloadedFile {
            path,
            bytes,
            content_type,
        })
    }

    /// Fetches a small resource fully into memory, refusing bodies larger
    /// than `max_bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::TooLarge`] once the body passes `max_bytes`,
    /// otherwise the same errors as [`download_to_path`](Self::download_to_path)
    /// minus the file system ones.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_bytes(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, DownloadError> {
        let response = self.send(url).await?;
        if response.content_length().is_some_and(|length| length > max_bytes) {
            return Err(DownloadError::too_large(url, max_bytes));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
            if (body.len() + chunk.len()) as u64 > max_bytes {
                return Err(DownloadError::too_large(url, max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_to_path_writes_body_and_reports_content_type() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/book.epub"))
            .and(header_exists("user-agent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/epub+zip")
                    .set_body_bytes(b"epub content here".as_slice()),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let destination = temp_dir.path().join("out.epub");
        let url = format!("{}/book.epub", mock_server.uri());

        let file = client.download_to_path(&url, &destination).await.unwrap();

        assert_eq!(file.path, destination);
        assert_eq!(file.bytes, 17);
        assert_eq!(file.content_type.as_deref(), Some("application/epub+zip"));
        assert_eq!(std::fs::read(&destination).unwrap(), b"epub content here");
    }

    #[tokio::test]
    async fn test_download_to_path_404_leaves_no_file() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/missing.epub"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = format!("{}/missing.epub", mock_server.uri());

        let result = client
            .download_to_path(&url, &temp_dir.path().join("out.epub"))
            .await;

        match result {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(entries.is_empty(), "found {entries:?}");
    }

    #[tokio::test]
    async fn test_download_cleanup_on_read_timeout() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"data".as_slice())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::with_timeouts(30, 1).unwrap();
        let url = format!("{}/slow", mock_server.uri());

        let result = client
            .download_to_path(&url, &temp_dir.path().join("slow.bin"))
            .await;

        assert!(
            matches!(
                result,
                Err(DownloadError::Timeout { .. } | DownloadError::Network { .. })
            ),
            "got {result:?}"
        );
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert!(entries.is_empty(), "found {entries:?}");
    }

    #[tokio::test]
    async fn test_download_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let client = HttpClient::new().unwrap();

        let result = client
            .download_to_path("not a url", &temp_dir.path().join("x"))
            .await;

        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_bytes_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cover.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".as_slice()))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let body = client
            .fetch_bytes(&format!("{}/cover.png", mock_server.uri()), 1024)
            .await
            .unwrap();

        assert_eq!(body, b"png");
    }

    #[tokio::test]
    async fn test_fetch_bytes_refuses_oversized_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new().unwrap();
        let result = client
            .fetch_bytes(&format!("{}/huge.png", mock_server.uri()), 1024)
            .await;

        assert!(
            matches!(result, Err(DownloadError::TooLarge { limit: 1024, .. })),
            "got {result:?}"
        );
    }
}
