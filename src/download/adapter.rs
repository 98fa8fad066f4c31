//! Catalog entry download: link resolution plus fetch into scratch.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use super::error::DownloadError;
use super::fetcher::RemoteFetcher;
use crate::publication::{Asset, Publication};

/// Href markers identifying an acquisition link: a package or a license document.
const DOWNLOAD_MARKERS: [&str; 2] = [".epub", ".lcpl"];

/// Wraps a [`RemoteFetcher`] for catalog publications.
#[derive(Clone)]
pub struct CatalogDownloadAdapter {
    fetcher: Arc<dyn RemoteFetcher>,
    scratch_dir: PathBuf,
}

impl std::fmt::Debug for CatalogDownloadAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogDownloadAdapter")
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl CatalogDownloadAdapter {
    #[must_use]
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// First link, in link-list order, whose href names a package or license.
    ///
    /// A relative href is resolved against the entry's `self` link. If the
    /// first match cannot be resolved there is no download URL.
    #[must_use]
    pub fn resolve_download_url(publication: &Publication) -> Option<Url> {
        let link = publication
            .links
            .iter()
            .find(|link| DOWNLOAD_MARKERS.iter().any(|marker| link.href.contains(marker)))?;
        match Url::parse(&link.href) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = publication
                    .links
                    .iter()
                    .find(|candidate| candidate.has_rel("self"))
                    .and_then(|candidate| Url::parse(&candidate.href).ok())?;
                base.join(&link.href).ok()
            }
            Err(_) => None,
        }
    }

    /// Downloads `url` into the scratch area.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's [`DownloadError`]; no partial file remains.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_to_temp(&self, url: &Url) -> Result<Asset, DownloadError> {
        let fetched = self.fetcher.fetch(url, &self.scratch_dir).await?;
        debug!(path = %fetched.path.display(), media_type = %fetched.media_type, "fetched to scratch");
        Ok(Asset::new(fetched.path, fetched.media_type))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::publication::Link;

    fn publication_with(hrefs: &[&str]) -> Publication {
        Publication {
            links: hrefs.iter().map(|href| Link::new(*href)).collect(),
            ..Publication::default()
        }
    }

    #[test]
    fn test_resolve_download_url_first_match_wins() {
        let publication = publication_with(&[
            "https://example.com/entry.json",
            "https://example.com/book.lcpl",
            "https://example.com/book.epub",
        ]);

        let url = CatalogDownloadAdapter::resolve_download_url(&publication).unwrap();

        assert_eq!(url.as_str(), "https://example.com/book.lcpl");
    }

    #[test]
    fn test_resolve_download_url_matches_marker_anywhere_in_href() {
        let publication = publication_with(&["https://example.com/get/book.epub?token=abc"]);
        assert!(CatalogDownloadAdapter::resolve_download_url(&publication).is_some());
    }

    #[test]
    fn test_resolve_download_url_none_without_marker() {
        let publication = publication_with(&[
            "https://example.com/entry.json",
            "https://example.com/book.pdf",
        ]);
        assert!(CatalogDownloadAdapter::resolve_download_url(&publication).is_none());
        assert!(CatalogDownloadAdapter::resolve_download_url(&Publication::default()).is_none());
    }

    #[test]
    fn test_resolve_download_url_joins_relative_href_to_self_link() {
        let mut publication =
            publication_with(&["books/relative.epub", "https://example.com/b.epub"]);
        publication
            .links
            .push(Link::new("https://catalog.example/opds/entry.json").with_rel("self"));

        let url = CatalogDownloadAdapter::resolve_download_url(&publication).unwrap();

        assert_eq!(url.as_str(), "https://catalog.example/opds/books/relative.epub");
    }

    #[test]
    fn test_resolve_download_url_unresolvable_first_match_is_none() {
        let publication = publication_with(&["books/relative.epub", "https://example.com/b.epub"]);
        assert!(CatalogDownloadAdapter::resolve_download_url(&publication).is_none());
    }
}
