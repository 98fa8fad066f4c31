//! Remote fetching for catalog acquisitions.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large packages)
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Partial files removed on error or cancellation
//! - Media type from `Content-Type`, refined by content sniffing
//! - Download link resolution for catalog publications
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use acquirer_core::download::{CatalogDownloadAdapter, HttpClient};
//! use acquirer_core::publication::Publication;
//!
//! # async fn example(publication: Publication) -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = CatalogDownloadAdapter::new(Arc::new(HttpClient::new()?), "/tmp/scratch");
//! if let Some(url) = CatalogDownloadAdapter::resolve_download_url(&publication) {
//!     let asset = adapter.fetch_to_temp(&url).await?;
//!     println!("{} ({})", asset.path.display(), asset.media_type);
//! }
//! # Ok(())
//! # }
//! ```

mod adapter;
mod client;
mod constants;
mod error;
mod fetcher;

pub use adapter::CatalogDownloadAdapter;
pub use client::{DownloadedFile, HttpClient};
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::DownloadError;
pub use fetcher::{FetchedFile, RemoteFetcher};

// No module-local Result alias here; use `Result<T, DownloadError>` explicitly.
