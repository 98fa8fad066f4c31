//! Acquirer Core Library
//!
//! Brings publications into a managed library: a local file or a catalog
//! entry goes in, a registered book with a cover thumbnail comes out.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`pipeline`] - the acquisition orchestrator and its failure taxonomy
//! - [`worker`] - JSON work payloads around the pipeline
//! - [`library`] - on-disk library layout and file ownership guards
//! - [`publication`] - publication model, media types, format service
//! - [`license`] - license-document exchange
//! - [`download`] - HTTP client and catalog download adapter
//! - [`catalog`] - `SQLite` book registry
//! - [`cover`] - cover extraction and thumbnails
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod cover;
pub mod db;
pub mod download;
pub mod library;
pub mod license;
pub mod pipeline;
pub mod publication;
pub mod worker;

mod user_agent;

// Re-export commonly used types
pub use catalog::{Book, Catalog, CatalogError, CatalogStore};
pub use cover::{CoverExtractor, CoverWriter, PngCoverWriter};
pub use db::Database;
pub use download::{DownloadError, HttpClient, RemoteFetcher};
pub use library::{AssetStore, PendingFile, StoreError};
pub use license::{LcplLicenseService, LicenseError, LicenseService, UnavailableLicenseService};
pub use pipeline::{
    Acquired, AcquisitionError, AcquisitionPipeline, AcquisitionRequest, InsertFailurePolicy,
};
pub use publication::{Asset, MediaType, Publication, PublicationOpener, Streamer};
pub use worker::{WorkInput, WorkResult, WorkStatus};
