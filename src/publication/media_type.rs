//! Media type detection.
//!
//! Detection order for files on disk is content first (zip `mimetype`
//! entry, container layout, JSON shape, magic bytes), then extension.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

const AUDIOBOOK_TYPE: &str = "http://schema.org/Audiobook";
const AUDIOBOOK_PROFILE: &str = "https://readium.org/webpub-manifest/profiles/audiobook";
const DIVINA_PROFILE: &str = "https://readium.org/webpub-manifest/profiles/divina";

/// Bytes read from the head of a file for magic-number checks.
const SNIFF_HEADER_LEN: usize = 8;

/// Manifests larger than this are not parsed while sniffing.
const MAX_SNIFFED_JSON_BYTES: u64 = 8 * 1024 * 1024;

/// How the acquisition pipeline treats a media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Self-contained publication package.
    Package,
    /// License document exchanged for the protected package.
    LicenseDocument,
    /// Manifest pointing at remote resources; not the canonical source.
    ManifestOnly,
    /// Anything else (generic containers, images, unknown bytes).
    Other,
}

/// Recognized content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Epub,
    LcpProtectedPdf,
    LcpLicenseDocument,
    ReadiumWebPubManifest,
    ReadiumWebPub,
    ReadiumAudiobookManifest,
    ReadiumAudiobook,
    DivinaManifest,
    Divina,
    Pdf,
    Cbz,
    Zip,
    Json,
    Png,
    Jpeg,
    Binary,
}

impl MediaType {
    /// Every variant, in matching priority order.
    pub const ALL: [Self; 16] = [
        Self::Epub,
        Self::LcpProtectedPdf,
        Self::LcpLicenseDocument,
        Self::ReadiumWebPubManifest,
        Self::ReadiumWebPub,
        Self::ReadiumAudiobookManifest,
        Self::ReadiumAudiobook,
        Self::DivinaManifest,
        Self::Divina,
        Self::Pdf,
        Self::Cbz,
        Self::Zip,
        Self::Json,
        Self::Png,
        Self::Jpeg,
        Self::Binary,
    ];

    /// Canonical MIME string.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Epub => "application/epub+zip",
            Self::LcpProtectedPdf => "application/pdf+lcp",
            Self::LcpLicenseDocument => "application/vnd.readium.lcp.license.v1.0+json",
            Self::ReadiumWebPubManifest => "application/webpub+json",
            Self::ReadiumWebPub => "application/webpub+zip",
            Self::ReadiumAudiobookManifest => "application/audiobook+json",
            Self::ReadiumAudiobook => "application/audiobook+zip",
            Self::DivinaManifest => "application/divina+json",
            Self::Divina => "application/divina+zip",
            Self::Pdf => "application/pdf",
            Self::Cbz => "application/vnd.comicbook+zip",
            Self::Zip => "application/zip",
            Self::Json => "application/json",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Binary => "application/octet-stream",
        }
    }

    /// Extension used when naming files of this type.
    #[must_use]
    pub fn file_extension(self) -> Option<&'static str> {
        match self {
            Self::Epub => Some("epub"),
            Self::LcpProtectedPdf => Some("lcpdf"),
            Self::LcpLicenseDocument => Some("lcpl"),
            Self::ReadiumWebPubManifest
            | Self::ReadiumAudiobookManifest
            | Self::DivinaManifest
            | Self::Json => Some("json"),
            Self::ReadiumWebPub => Some("webpub"),
            Self::ReadiumAudiobook => Some("audiobook"),
            Self::Divina => Some("divina"),
            Self::Pdf => Some("pdf"),
            Self::Cbz => Some("cbz"),
            Self::Zip => Some("zip"),
            Self::Png => Some("png"),
            Self::Jpeg => Some("jpg"),
            Self::Binary => None,
        }
    }

    #[must_use]
    pub fn kind(self) -> MediaKind {
        match self {
            Self::Epub
            | Self::LcpProtectedPdf
            | Self::ReadiumWebPub
            | Self::ReadiumAudiobook
            | Self::Divina
            | Self::Pdf
            | Self::Cbz => MediaKind::Package,
            Self::LcpLicenseDocument => MediaKind::LicenseDocument,
            Self::ReadiumWebPubManifest | Self::ReadiumAudiobookManifest | Self::DivinaManifest => {
                MediaKind::ManifestOnly
            }
            Self::Zip | Self::Json | Self::Png | Self::Jpeg | Self::Binary => MediaKind::Other,
        }
    }

    #[must_use]
    pub fn is_license_document(self) -> bool {
        self.kind() == MediaKind::LicenseDocument
    }

    #[must_use]
    pub fn is_manifest_only(self) -> bool {
        self.kind() == MediaKind::ManifestOnly
    }

    /// Types that say nothing about the publication format; sniffing can refine them.
    #[must_use]
    pub fn is_generic(self) -> bool {
        matches!(self, Self::Zip | Self::Json | Self::Binary)
    }

    /// Parses a MIME string, ignoring parameters and case.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        let essence = essence.to_ascii_lowercase();
        match essence.as_str() {
            "image/jpg" => return Some(Self::Jpeg),
            "application/x-cbz" => return Some(Self::Cbz),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.mime() == essence)
    }

    /// Maps a file extension (without the dot) to a type.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "epub" => Some(Self::Epub),
            "lcpdf" => Some(Self::LcpProtectedPdf),
            "lcpl" => Some(Self::LcpLicenseDocument),
            "webpub" => Some(Self::ReadiumWebPub),
            "audiobook" => Some(Self::ReadiumAudiobook),
            "divina" => Some(Self::Divina),
            "pdf" => Some(Self::Pdf),
            "cbz" => Some(Self::Cbz),
            "zip" => Some(Self::Zip),
            "json" => Some(Self::Json),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Extension-based guess for a path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detects the type of a file by inspecting its content.
    ///
    /// Blocking; call through [`detect_media_type`] from async code.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file cannot be opened or read.
    pub fn sniff(path: &Path) -> std::io::Result<Self> {
        let mut header = [0_u8; SNIFF_HEADER_LEN];
        let read = {
            let mut file = File::open(path)?;
            read_header(&mut file, &mut header)?
        };
        let header = &header[..read];

        let sniffed = if header.starts_with(b"PK\x03\x04") {
            sniff_zip(path)
        } else if header.starts_with(b"%PDF") {
            Some(Self::Pdf)
        } else if header.starts_with(b"\x89PNG") {
            Some(Self::Png)
        } else if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if looks_like_json(header) {
            sniff_json_file(path)
        } else {
            None
        };

        Ok(sniffed
            .or_else(|| Self::from_path(path))
            .unwrap_or(Self::Binary))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Resolves the media type of a downloaded or copied file.
///
/// A specific `mime_hint` (e.g. a response `Content-Type`) is trusted as is;
/// generic or missing hints fall back to content sniffing.
pub async fn detect_media_type(path: &Path, mime_hint: Option<&str>) -> MediaType {
    if let Some(hinted) = mime_hint.and_then(MediaType::from_mime)
        && !hinted.is_generic()
    {
        return hinted;
    }

    let owned: PathBuf = path.to_path_buf();
    match tokio::task::spawn_blocking(move || MediaType::sniff(&owned)).await {
        Ok(Ok(media_type)) => {
            debug!(path = %path.display(), media_type = %media_type, "sniffed media type");
            media_type
        }
        Ok(Err(error)) => {
            warn!(path = %path.display(), error = %error, "could not sniff media type");
            MediaType::from_path(path).unwrap_or(MediaType::Binary)
        }
        Err(error) => {
            warn!(error = %error, "media type sniffing task failed");
            MediaType::from_path(path).unwrap_or(MediaType::Binary)
        }
    }
}

fn read_header(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buffer.len() {
        let read = file.read(&mut buffer[total..])?;
        if read == 0 {
            break;
        }
        total += read;
    }
    Ok(total)
}

fn looks_like_json(header: &[u8]) -> bool {
    header
        .iter()
        .find(|byte| !byte.is_ascii_whitespace())
        .is_some_and(|byte| *byte == b'{')
}

fn sniff_json_file(path: &Path) -> Option<MediaType> {
    let file = File::open(path).ok()?;
    if file.metadata().ok()?.len() > MAX_SNIFFED_JSON_BYTES {
        return Some(MediaType::Json);
    }
    let value: Value = serde_json::from_reader(BufReader::new(file)).ok()?;
    Some(classify_json(&value))
}

fn classify_json(value: &Value) -> MediaType {
    if value.get("provider").is_some() && value.get("encryption").is_some() {
        return MediaType::LcpLicenseDocument;
    }
    if value.get("metadata").is_some()
        && (value.get("readingOrder").is_some() || value.get("links").is_some())
    {
        return classify_manifest(value, false);
    }
    MediaType::Json
}

/// Distinguishes audiobook, DiViNa and plain web publication manifests.
fn classify_manifest(manifest: &Value, packaged: bool) -> MediaType {
    let metadata = manifest.get("metadata");
    let declared_type = metadata
        .and_then(|m| m.get("@type"))
        .and_then(Value::as_str);
    let profiles = metadata
        .and_then(|m| m.get("conformsTo"))
        .map(|value| match value {
            Value::String(single) => vec![single.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        })
        .unwrap_or_default();

    let is_audiobook =
        declared_type == Some(AUDIOBOOK_TYPE) || profiles.contains(&AUDIOBOOK_PROFILE);
    let is_divina = profiles.contains(&DIVINA_PROFILE) || reading_order_is_bitmaps(manifest);

    match (is_audiobook, is_divina, packaged) {
        (true, _, false) => MediaType::ReadiumAudiobookManifest,
        (true, _, true) => MediaType::ReadiumAudiobook,
        (false, true, false) => MediaType::DivinaManifest,
        (false, true, true) => MediaType::Divina,
        (false, false, false) => MediaType::ReadiumWebPubManifest,
        (false, false, true) => MediaType::ReadiumWebPub,
    }
}

fn reading_order_is_bitmaps(manifest: &Value) -> bool {
    let Some(items) = manifest.get("readingOrder").and_then(Value::as_array) else {
        return false;
    };
    !items.is_empty()
        && items.iter().all(|item| {
            item.get("type")
                .and_then(Value::as_str)
                .is_some_and(|mime| mime.starts_with("image/"))
        })
}

fn sniff_zip(path: &Path) -> Option<MediaType> {
    let file = File::open(path).ok()?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).ok()?;

    if let Ok(mut entry) = archive.by_name("mimetype") {
        let mut declared = String::new();
        if entry.read_to_string(&mut declared).is_ok()
            && let Some(media_type) = MediaType::from_mime(declared.trim())
            && !media_type.is_generic()
        {
            return Some(media_type);
        }
    }

    if archive.by_name("META-INF/container.xml").is_ok() {
        return Some(MediaType::Epub);
    }

    if let Ok(entry) = archive.by_name("manifest.json") {
        let manifest: Option<Value> = serde_json::from_reader(entry).ok();
        if let Some(manifest) = manifest {
            return Some(classify_manifest(&manifest, true));
        }
    }

    let has_license = archive.by_name("META-INF/license.lcpl").is_ok();
    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    let content: Vec<&String> = names
        .iter()
        .filter(|name| !name.ends_with('/') && !name.starts_with("META-INF/"))
        .collect();

    if has_license
        && content
            .iter()
            .any(|name| name.to_ascii_lowercase().ends_with(".pdf"))
    {
        return Some(MediaType::LcpProtectedPdf);
    }

    if !content.is_empty() && content.iter().all(|name| is_bitmap_name(name)) {
        return Some(MediaType::Cbz);
    }

    Some(MediaType::Zip)
}

fn is_bitmap_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}
