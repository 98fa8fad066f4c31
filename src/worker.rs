//! Work payloads: the JSON contract between a scheduler and the pipeline.
//!
//! Input keys are `publication_download_uri` (a local source), `publication`
//! (a catalog entry, as an object or a JSON-encoded string) and `source_url`.
//! The source URI wins when both a source and a publication are given.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::pipeline::{AcquisitionPipeline, AcquisitionRequest};
use crate::publication::Publication;

/// Input key carrying the local source URI.
pub const DOWNLOAD_URI: &str = "publication_download_uri";

/// One unit of work as handed over by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_download_uri: Option<String>,
    #[serde(
        default,
        deserialize_with = "embedded_publication",
        skip_serializing_if = "Option::is_none"
    )]
    pub publication: Option<Publication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl WorkInput {
    /// The request this input describes, or `None` when it names nothing.
    #[must_use]
    pub fn into_request(self) -> Option<AcquisitionRequest> {
        match (self.publication_download_uri, self.publication) {
            (Some(source_uri), _) => Some(AcquisitionRequest::Local {
                source_uri,
                source_url: self.source_url,
            }),
            (None, Some(publication)) => Some(AcquisitionRequest::remote(publication)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Success,
    Failure,
}

/// Payload attached to a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkData {
    pub error: String,
}

/// Outcome reported back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkResult {
    pub status: WorkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<WorkData>,
}

impl WorkResult {
    #[must_use]
    pub fn success(book_id: i64) -> Self {
        Self {
            status: WorkStatus::Success,
            book_id: Some(book_id),
            data: None,
        }
    }

    #[must_use]
    pub fn failure(message: Option<String>) -> Self {
        Self {
            status: WorkStatus::Failure,
            book_id: None,
            data: message.map(|error| WorkData { error }),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == WorkStatus::Success
    }
}

/// A finished run plus the still-running cover job, if one was started.
#[derive(Debug)]
pub struct WorkOutcome {
    pub result: WorkResult,
    pub cover_task: Option<JoinHandle<()>>,
}

/// Executes `input` on `pipeline`.
///
/// Never fails: every error becomes a failure [`WorkResult`].
#[instrument(skip_all)]
pub async fn run(pipeline: &AcquisitionPipeline, input: WorkInput) -> WorkOutcome {
    let Some(request) = input.into_request() else {
        warn!("work input names neither a source nor a publication");
        return WorkOutcome {
            result: WorkResult::failure(None),
            cover_task: None,
        };
    };

    match pipeline.acquire(request).await {
        Ok(acquired) => WorkOutcome {
            result: WorkResult::success(acquired.book_id),
            cover_task: Some(acquired.cover_task),
        },
        Err(error) => {
            debug!(error = ?error, "work failed");
            WorkOutcome {
                result: WorkResult::failure(error.user_message()),
                cover_task: None,
            }
        }
    }
}

/// Accepts the publication inline or as a JSON string.
fn embedded_publication<'de, D>(deserializer: D) -> Result<Option<Publication>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(encoded)) => serde_json::from_str(&encoded)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
