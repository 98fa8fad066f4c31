//! Catalog row type.

use serde::Serialize;
use sqlx::FromRow;

/// A registered publication.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Book {
    /// Unique identifier assigned on insert.
    pub id: i64,
    /// Insert time (`SQLite` `datetime('now')`, UTC).
    pub created_at: String,
    /// Library file path, or the source URL of a manifest-only publication.
    pub href: String,
    pub title: Option<String>,
    /// Authors joined with `", "`.
    pub author: Option<String>,
    pub identifier: Option<String>,
    /// Reading position; never written during acquisition.
    pub progression: Option<String>,
    /// File extension recorded at acquisition time.
    pub extension: String,
}
