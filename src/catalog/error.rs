//! Error types for catalog operations.

use thiserror::Error;

/// Errors raised by the catalog store.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying SQL failure.
    #[error("catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A book is already registered under this href; nothing was inserted.
    #[error("a book is already registered at {href}")]
    DuplicateHref {
        /// Conflicting href.
        href: String,
    },

    /// Requested book does not exist.
    #[error("book not found: {0}")]
    NotFound(i64),
}

impl CatalogError {
    /// True when the insert was ignored rather than failing in SQLite.
    #[must_use]
    pub fn is_ignored_insert(&self) -> bool {
        matches!(self, Self::DuplicateHref { .. })
    }
}
