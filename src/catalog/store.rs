//! Repository seam for catalog writes.
//!
//! The acquisition pipeline only needs to insert; depending on this trait
//! instead of [`Catalog`] lets tests substitute failing or slow stores.

use async_trait::async_trait;

use super::{Catalog, Result};
use crate::publication::Publication;

/// Data-access contract for registering acquired publications.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a book and returns its id.
    async fn insert_book(
        &self,
        href: &str,
        extension: &str,
        publication: &Publication,
    ) -> Result<i64>;
}

#[async_trait]
impl CatalogStore for Catalog {
    async fn insert_book(
        &self,
        href: &str,
        extension: &str,
        publication: &Publication,
    ) -> Result<i64> {
        Catalog::insert_book(self, href, extension, publication).await
    }
}
