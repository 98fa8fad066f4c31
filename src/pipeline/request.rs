use crate::publication::Publication;

/// What to acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionRequest {
    /// A file the user picked, by path or `file://` URI.
    Local {
        source_uri: String,
        /// Canonical location of the content, required for manifest-only formats.
        source_url: Option<String>,
    },
    /// A catalog entry to download.
    Remote { publication: Box<Publication> },
}

impl AcquisitionRequest {
    #[must_use]
    pub fn local(source_uri: impl Into<String>) -> Self {
        Self::Local {
            source_uri: source_uri.into(),
            source_url: None,
        }
    }

    #[must_use]
    pub fn remote(publication: Publication) -> Self {
        Self::Remote {
            publication: Box::new(publication),
        }
    }

    /// `"local"` or `"remote"`, for logs.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Remote { .. } => "remote",
        }
    }
}
