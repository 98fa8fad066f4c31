//! Shared fixtures for integration tests: sample packages, a temp library,
//! and fake collaborators for the seams the pipeline depends on.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use acquirer_core::catalog::CatalogError;
use acquirer_core::cover::{CoverError, CoverWriter, encode_png};
use acquirer_core::license::{AcquiredLicense, LicenseError, LicenseService};
use acquirer_core::pipeline::AcquisitionPipelineBuilder;
use acquirer_core::{
    AcquisitionPipeline, AssetStore, Catalog, CatalogStore, Database, HttpClient, Publication,
};
use async_trait::async_trait;
use image::DynamicImage;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const CONTENT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:5d1c0c8e-0000-4000-8000-000000000042</dc:identifier>
    <dc:title>The Voyage Out</dc:title>
    <dc:creator>Virginia Woolf</dc:creator>
    <dc:language>en</dc:language>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover" href="images/cover.png" media-type="image/png" properties="cover-image"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
  </spine>
</package>"#;

const NAV_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Nav</title></head>
<body><nav epub:type="toc"><ol><li><a href="chapter1.xhtml">One</a></li></ol></nav></body>
</html>"#;

const CHAPTER_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>One</title></head><body><p>Hi</p></body></html>"#;

pub const EPUB_TITLE: &str = "The Voyage Out";
pub const EPUB_IDENTIFIER: &str = "urn:uuid:5d1c0c8e-0000-4000-8000-000000000042";

/// A small solid-color PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_png(&DynamicImage::new_rgb8(width, height)).expect("encode png")
}

/// A minimal valid EPUB 3 with a PNG cover.
pub fn epub_bytes() -> Vec<u8> {
    epub_with_cover_at("images/cover.png")
}

/// Like [`epub_bytes`], with the declared cover image stored at `href`
/// (relative to the OPF).
pub fn epub_with_cover_at(href: &str) -> Vec<u8> {
    let cover = png_bytes(30, 40);
    let opf = CONTENT_OPF.replace("images/cover.png", href);
    let cover_entry = format!("OEBPS/{href}");
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let entries: [(&str, &[u8]); 6] = [
        ("mimetype", b"application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/nav.xhtml", NAV_XHTML.as_bytes()),
        ("OEBPS/chapter1.xhtml", CHAPTER_XHTML.as_bytes()),
        (cover_entry.as_str(), &cover),
    ];
    for (name, bytes) in entries {
        writer.start_file(name, stored).expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A bare Readium Web Publication Manifest.
pub fn manifest_json() -> &'static str {
    r#"{"metadata":{"title":"Streamed Book","identifier":"urn:x:1"},
        "links":[{"rel":"self","href":"https://example.com/manifest.json","type":"application/webpub+json"}],
        "readingOrder":[{"href":"https://example.com/c1.html","type":"text/html"}]}"#
}

/// An LCP license document shape, enough for sniffing.
pub fn license_json(publication_href: &str) -> String {
    format!(
        r#"{{"id":"lic-1","provider":"https://provider.example","encryption":{{"profile":"basic"}},
           "links":[{{"rel":"publication","href":"{publication_href}","type":"application/epub+zip"}}]}}"#
    )
}

/// A temp library with an in-memory catalog.
pub struct Fixture {
    pub dir: TempDir,
    pub store: AssetStore,
    pub catalog: Catalog,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = AssetStore::new(dir.path().join("library"), dir.path().join("scratch"));
        store.prepare().await.expect("prepare library");
        let catalog = Catalog::new(Database::new_in_memory().await.expect("in-memory db"));
        Self {
            dir,
            store,
            catalog,
        }
    }

    /// Writes `bytes` outside the library and returns its path.
    pub fn source(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let incoming = self.dir.path().join("incoming");
        std::fs::create_dir_all(&incoming).expect("incoming dir");
        let path = incoming.join(name);
        std::fs::write(&path, bytes).expect("write source");
        path
    }

    pub fn builder(&self) -> AcquisitionPipelineBuilder {
        self.builder_with_catalog(Arc::new(self.catalog.clone()))
    }

    pub fn builder_with_catalog(&self, catalog: Arc<dyn CatalogStore>) -> AcquisitionPipelineBuilder {
        AcquisitionPipeline::builder(
            self.store.clone(),
            catalog,
            Arc::new(HttpClient::new().expect("http client")),
        )
    }

    pub fn pipeline(&self) -> AcquisitionPipeline {
        self.builder().build()
    }

    /// Publication files in the library root (covers excluded).
    pub fn library_files(&self) -> Vec<PathBuf> {
        files_in(self.store.root())
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        files_in(self.store.scratch_dir())
    }
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

/// License service with a scripted answer.
pub enum ScriptedLicense {
    /// Writes `bytes` next to the license and suggests `filename`.
    Grant { bytes: Vec<u8>, filename: String },
    Reject(String),
    /// Never answers.
    Hang,
}

#[async_trait]
impl LicenseService for ScriptedLicense {
    async fn acquire(&self, license_file: &Path) -> Result<AcquiredLicense, LicenseError> {
        match self {
            Self::Grant { bytes, filename } => {
                let local_file = license_file.with_extension("unlocked");
                std::fs::write(&local_file, bytes).map_err(|e| LicenseError::io(&local_file, e))?;
                Ok(AcquiredLicense {
                    local_file,
                    suggested_filename: filename.clone(),
                })
            }
            Self::Reject(message) => Err(LicenseError::Rejected(message.clone())),
            Self::Hang => std::future::pending().await,
        }
    }
}

/// Catalog whose inserts always fail.
pub struct RejectingCatalog;

#[async_trait]
impl CatalogStore for RejectingCatalog {
    async fn insert_book(
        &self,
        href: &str,
        _extension: &str,
        _publication: &Publication,
    ) -> Result<i64, CatalogError> {
        Err(CatalogError::DuplicateHref {
            href: href.to_string(),
        })
    }
}

/// Cover writer that stalls before writing a marker file.
pub struct SlowCoverWriter {
    pub delay: Duration,
}

#[async_trait]
impl CoverWriter for SlowCoverWriter {
    async fn store(&self, _image: DynamicImage, destination: &Path) -> Result<(), CoverError> {
        tokio::time::sleep(self.delay).await;
        std::fs::write(destination, b"late").map_err(|e| CoverError::Io {
            path: destination.to_path_buf(),
            source: e,
        })
    }
}
