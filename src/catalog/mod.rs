//! Catalog module: `SQLite`-backed registry of acquired publications.
//!
//! - [`Catalog`] - insert and query operations
//! - [`Book`] - one registered publication
//! - [`CatalogStore`] - the write seam the acquisition pipeline depends on
//! - [`CatalogError`] - operation error types
//!
//! # Example
//!
//! ```ignore
//! use acquirer_core::catalog::Catalog;
//! use acquirer_core::Database;
//! use std::path::Path;
//!
//! let db = Database::new(Path::new("catalog.db")).await?;
//! let catalog = Catalog::new(db);
//! let id = catalog.insert_book("/library/1f0c.epub", "epub", &publication).await?;
//! let book = catalog.get_book(id).await?;
//! ```

mod book;
mod error;
mod store;

pub use book::Book;
pub use error::CatalogError;
pub use store::CatalogStore;

use tracing::{debug, instrument};

use crate::db::Database;
use crate::publication::Publication;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

const BOOK_COLUMNS: &str =
    "id, created_at, href, title, author, identifier, progression, extension";

/// Catalog of registered books.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers a publication under `href`.
    ///
    /// The insert is a single statement; a row already registered under the
    /// same href makes it a no-op reported as [`CatalogError::DuplicateHref`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateHref`] when nothing was inserted, or
    /// [`CatalogError::Database`] if the statement fails.
    #[instrument(skip(self, publication), fields(href = %href, extension = %extension))]
    pub async fn insert_book(
        &self,
        href: &str,
        extension: &str,
        publication: &Publication,
    ) -> Result<i64> {
        let inserted: Option<(i64,)> = sqlx::query_as(
            r"INSERT INTO books (href, title, author, identifier, extension)
              VALUES (?, ?, ?, ?, ?)
              ON CONFLICT(href) DO NOTHING
              RETURNING id",
        )
        .bind(href)
        .bind(publication.metadata.title.as_deref())
        .bind(publication.author_line())
        .bind(publication.metadata.identifier.as_deref())
        .bind(extension)
        .fetch_optional(self.db.pool())
        .await?;

        let Some((id,)) = inserted else {
            return Err(CatalogError::DuplicateHref {
                href: href.to_string(),
            });
        };
        debug!(book_id = id, "book registered");
        Ok(id)
    }

    /// Fetches a book by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if no such book exists.
    #[instrument(skip(self))]
    pub async fn get_book(&self, id: i64) -> Result<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    /// All books, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(books)
    }

    /// Number of registered books.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
