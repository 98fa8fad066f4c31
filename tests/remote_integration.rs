//! Integration tests for catalog-entry acquisitions against a mock server.

mod support;

use std::path::PathBuf;
use std::sync::Arc;

use acquirer_core::cover::{COVER_HEIGHT, COVER_WIDTH};
use acquirer_core::publication::Link;
use acquirer_core::worker::{self, WorkInput, WorkStatus};
use acquirer_core::{
    AcquisitionError, AcquisitionRequest, CoverExtractor, HttpClient, Publication,
};
use image::GenericImageView;
use support::{Fixture, RejectingCatalog, epub_bytes, png_bytes};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn catalog_server() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books/voyage.epub"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/epub+zip")
                .set_body_bytes(epub_bytes()),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/covers/voyage.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/png")
                .set_body_bytes(png_bytes(60, 90)),
        )
        .mount(&mock_server)
        .await;
    mock_server
}

fn catalog_entry(base: &str, download: &str) -> Publication {
    let json = format!(
        r#"{{
            "metadata": {{"title": "Catalog Title", "author": {{"name": "Catalog Author"}}}},
            "links": [
                {{"rel": "self", "href": "{base}/entries/voyage.json", "type": "application/opds-publication+json"}},
                {{"rel": "http://opds-spec.org/acquisition", "href": "{base}{download}", "type": "application/epub+zip"}}
            ],
            "images": [{{"href": "{base}/covers/voyage.png", "type": "image/png"}}]
        }}"#
    );
    serde_json::from_str(&json).expect("catalog entry")
}

#[tokio::test]
async fn test_remote_entry_is_downloaded_and_registered_with_catalog_metadata() {
    let mock_server = catalog_server().await;
    let fixture = Fixture::new().await;
    let pipeline = fixture
        .builder()
        .cover_extractor(CoverExtractor::new(HttpClient::new().unwrap()))
        .build();
    let entry = catalog_entry(&mock_server.uri(), "/books/voyage.epub");

    let acquired = pipeline
        .acquire(AcquisitionRequest::remote(entry))
        .await
        .unwrap();

    assert_eq!(acquired.extension, "epub");
    let stored = PathBuf::from(&acquired.href);
    assert_eq!(stored.parent().unwrap(), fixture.store.root());
    assert_eq!(std::fs::read(&stored).unwrap(), epub_bytes());

    let book = fixture.catalog.get_book(acquired.book_id).await.unwrap();
    assert_eq!(book.title.as_deref(), Some("Catalog Title"));
    assert_eq!(book.author.as_deref(), Some("Catalog Author"));
    assert!(fixture.scratch_files().is_empty());

    acquired.cover_task.await.unwrap();
    let cover = image::open(fixture.store.cover_path(acquired.book_id)).unwrap();
    assert_eq!(cover.dimensions(), (COVER_WIDTH, COVER_HEIGHT));
}

#[tokio::test]
async fn test_remote_entry_without_download_link() {
    let fixture = Fixture::new().await;
    let mut entry = Publication::default();
    entry.links.push(Link::new("https://example.com/entries/1.json").with_rel("self"));

    let error = fixture
        .pipeline()
        .acquire(AcquisitionRequest::remote(entry))
        .await
        .unwrap_err();

    assert!(matches!(error, AcquisitionError::NoDownloadLink));
    assert!(error.user_message().is_none());
    assert_eq!(fixture.catalog.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_remote_download_failure_leaves_nothing() {
    let mock_server = catalog_server().await;
    let fixture = Fixture::new().await;
    let entry = catalog_entry(&mock_server.uri(), "/books/missing.epub");

    let error = fixture
        .pipeline()
        .acquire(AcquisitionRequest::remote(entry))
        .await
        .unwrap_err();

    assert!(matches!(error, AcquisitionError::DownloadFailed(_)), "got {error:?}");
    assert!(fixture.scratch_files().is_empty());
    assert!(fixture.library_files().is_empty());
}

#[tokio::test]
async fn test_remote_insert_failure_removes_download() {
    let mock_server = catalog_server().await;
    let fixture = Fixture::new().await;
    let pipeline = fixture
        .builder_with_catalog(Arc::new(RejectingCatalog))
        .build();
    let entry = catalog_entry(&mock_server.uri(), "/books/voyage.epub");

    let error = pipeline
        .acquire(AcquisitionRequest::remote(entry))
        .await
        .unwrap_err();

    assert!(matches!(error, AcquisitionError::DatabaseInsertFailed(_)));
    assert!(fixture.library_files().is_empty());
    assert!(fixture.scratch_files().is_empty());
}

#[tokio::test]
async fn test_worker_remote_failures_carry_no_payload() {
    let mock_server = catalog_server().await;
    let fixture = Fixture::new().await;
    let pipeline = fixture.pipeline();

    let no_link = worker::run(
        &pipeline,
        WorkInput {
            publication: Some(Publication::default()),
            ..WorkInput::default()
        },
    )
    .await;
    let not_found = worker::run(
        &pipeline,
        WorkInput {
            publication: Some(catalog_entry(&mock_server.uri(), "/books/missing.epub")),
            ..WorkInput::default()
        },
    )
    .await;

    for outcome in [no_link, not_found] {
        assert_eq!(outcome.result.status, WorkStatus::Failure);
        assert!(outcome.result.data.is_none());
    }
}

#[tokio::test]
async fn test_worker_remote_success_reports_book_id() {
    let mock_server = catalog_server().await;
    let fixture = Fixture::new().await;
    let input: WorkInput = serde_json::from_value(serde_json::json!({
        "publication": serde_json::to_string(
            &catalog_entry(&mock_server.uri(), "/books/voyage.epub")
        ).unwrap()
    }))
    .unwrap();

    let outcome = worker::run(&fixture.pipeline(), input).await;

    assert_eq!(outcome.result.status, WorkStatus::Success);
    let book_id = outcome.result.book_id.unwrap();
    assert_eq!(
        fixture.catalog.get_book(book_id).await.unwrap().extension,
        "epub"
    );
}
