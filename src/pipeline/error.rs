//! Acquisition failure reasons.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::download::DownloadError;
use crate::library::StoreError;

/// Why an acquisition stopped.
///
/// Every variant is terminal for the request. The display text is the short
/// user-facing message; sources are kept for logging only.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Unable to copy the publication")]
    CopyFailed(#[source] StoreError),

    #[error("Unable to download the publication")]
    DownloadFailed(#[source] DownloadError),

    /// License exchange failed; the message comes from the license service.
    #[error("{message}")]
    AcquisitionFailed { message: String },

    #[error("Unable to move the publication into the library")]
    MoveFailed(#[source] StoreError),

    /// The format service could not open the file.
    #[error("{message}")]
    OpenFailed { message: String },

    #[error("Unable to add the publication to the database")]
    DatabaseInsertFailed(#[source] CatalogError),

    #[error("Manifest-only publication has no source URL")]
    MissingSourceUrl,

    #[error("No download link found for the publication")]
    NoDownloadLink,
}

impl AcquisitionError {
    /// Message for the failure payload.
    ///
    /// Reasons that are reported as a bare failure return `None`.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::MissingSourceUrl | Self::NoDownloadLink | Self::DownloadFailed(_) => None,
            other => Some(other.to_string()),
        }
    }
}
