//! Publication model shared by the catalog, opener and cover stages.
//!
//! A [`Publication`] deserializes from the OPDS 2 / Readium Web Publication
//! Manifest JSON shape, which is also what catalog entries are serialized as
//! when handed to the worker. Openers fill the same structure from packages
//! on disk.
//!
//! - [`MediaType`] - closed set of recognized content kinds plus sniffing
//! - [`PublicationOpener`] - format service seam, with [`Streamer`] as the
//!   shipped implementation

mod media_type;
mod opener;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use media_type::{MediaKind, MediaType, detect_media_type};
pub use opener::{OpenError, PublicationOpener, Streamer};
pub(crate) use opener::read_entry;

/// A file on disk plus its detected content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Location of the file.
    pub path: PathBuf,
    /// Detected media type.
    pub media_type: MediaType,
}

impl Asset {
    /// Creates an asset descriptor.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, media_type: MediaType) -> Self {
        Self {
            path: path.into(),
            media_type,
        }
    }

    /// Extension of the file itself, if any.
    #[must_use]
    pub fn file_extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

/// A link object (`href`, `type`, `rel`, `title`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub rel: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel.push(rel.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Whether any of the link relations equals `rel`.
    #[must_use]
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rel.iter().any(|candidate| candidate == rel)
    }
}

/// Descriptive metadata used for the catalog record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(
        default,
        deserialize_with = "localized_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        rename = "author",
        default,
        deserialize_with = "contributors",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub authors: Vec<String>,
    #[serde(
        default,
        deserialize_with = "first_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub language: Option<String>,
    #[serde(
        default,
        deserialize_with = "first_contributor",
        skip_serializing_if = "Option::is_none"
    )]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A publication, either as described by a catalog or as opened from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(
        rename = "readingOrder",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub reading_order: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Link>,
    /// OPDS gallery images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Link>,
    /// Cover bytes read by the opener, when the package embeds one.
    #[serde(skip)]
    pub cover: Option<Vec<u8>>,
    /// Package the publication was opened from; relative hrefs resolve inside it.
    #[serde(skip)]
    pub package: Option<PathBuf>,
}

impl Publication {
    /// First link tagged `cover`, searching links, resources, then images.
    #[must_use]
    pub fn cover_link(&self) -> Option<&Link> {
        self.links
            .iter()
            .chain(&self.resources)
            .chain(&self.images)
            .find(|link| link.has_rel("cover"))
    }

    /// Authors joined for display and storage.
    #[must_use]
    pub fn author_line(&self) -> Option<String> {
        if self.metadata.authors.is_empty() {
            None
        } else {
            Some(self.metadata.authors.join(", "))
        }
    }

    /// Directory relative hrefs resolve against when there is no package.
    #[must_use]
    pub fn package_path(&self) -> Option<&Path> {
        self.package.as_deref()
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(single)) => vec![single],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    })
}

/// Titles are either a plain string or a language map; the first entry wins.
fn localized_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(localized_value))
}

fn localized_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("en")
            .or_else(|| map.values().next())
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

fn first_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(one_or_many(deserializer)?.into_iter().next())
}

/// Contributors are a string, an object with `name`, or an array of either.
fn contributors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(contributor_name).collect(),
        Some(single) => contributor_name(&single).into_iter().collect(),
        None => Vec::new(),
    })
}

fn first_contributor<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(contributors(deserializer)?.into_iter().next())
}

fn contributor_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) => Some(name.clone()),
        Value::Object(map) => map.get("name").and_then(localized_value),
        _ => None,
    }
}
