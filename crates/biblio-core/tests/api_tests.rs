//! Integration tests for the BiblioApi public interface.
//!
//! These tests verify that the façade wires the stores, callback addressing,
//! and conversion pipeline together correctly.

use biblio_core::{
    BiblioApi, BiblioError, BookFormat, BookRecord, CallbackPrefix, UserRecord, UserStatus,
};
use tempfile::TempDir;

fn create_api() -> (TempDir, BiblioApi) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let api = BiblioApi::new(temp_dir.path()).expect("Failed to create api");
    (temp_dir, api)
}

#[test]
fn test_api_creation_succeeds() {
    let (temp_dir, api) = create_api();

    assert_eq!(api.app_root(), temp_dir.path());
    assert!(temp_dir.path().join("data").is_dir());
    assert!(api.uploads_dir().is_dir());
}

#[test]
fn test_book_lifecycle() {
    let (_temp_dir, api) = create_api();

    api.add_book(
        BookRecord::new("Война и мир")
            .with_author("Лев Толстой")
            .with_description("Роман-эпопея"),
    )
    .unwrap();

    let book = api.get_book("Война и мир").unwrap();
    assert_eq!(book.author.as_deref(), Some("Лев Толстой"));

    // Duplicate titles are rejected
    let err = api.add_book(BookRecord::new("Война и мир")).unwrap_err();
    assert!(matches!(err, BiblioError::Validation { .. }));

    api.delete_book("Война и мир").unwrap();
    assert!(matches!(
        api.get_book("Война и мир"),
        Err(BiblioError::BookNotFound { .. })
    ));
}

#[test]
fn test_delete_book_removes_stored_files() {
    let (temp_dir, api) = create_api();

    let epub = temp_dir.path().join("books").join("dune.epub");
    std::fs::write(&epub, b"epub bytes").unwrap();

    api.add_book(BookRecord::new("Dune").with_file(BookFormat::Epub, &epub))
        .unwrap();

    api.delete_book("Dune").unwrap();
    assert!(!epub.exists());
}

#[test]
fn test_payload_roundtrip_through_catalog() {
    let (_temp_dir, api) = create_api();

    api.add_book(BookRecord::new("Сто лет одиночества")).unwrap();
    api.add_book(BookRecord::new("Игра в бисер")).unwrap();

    let wire = api
        .book_payload(
            CallbackPrefix::BookDownload,
            "Сто лет одиночества",
            Some(BookFormat::Epub),
        )
        .unwrap();
    assert!(wire.len() <= 64);

    let (payload, record) = api.resolve_payload(&wire).unwrap();
    assert_eq!(payload.prefix, CallbackPrefix::BookDownload);
    assert_eq!(payload.format, Some(BookFormat::Epub));
    assert_eq!(record.title, "Сто лет одиночества");
}

#[test]
fn test_resolve_payload_for_deleted_book() {
    let (_temp_dir, api) = create_api();

    api.add_book(BookRecord::new("Ghost")).unwrap();
    let wire = api
        .book_payload(CallbackPrefix::BookShow, "Ghost", None)
        .unwrap();

    api.delete_book("Ghost").unwrap();

    assert!(matches!(
        api.resolve_payload(&wire),
        Err(BiblioError::BookNotFound { .. })
    ));
}

#[test]
fn test_search_books() {
    let (_temp_dir, api) = create_api();

    api.add_book(BookRecord::new("Dune").with_author("Frank Herbert"))
        .unwrap();
    api.add_book(BookRecord::new("Hyperion").with_author("Dan Simmons"))
        .unwrap();

    let hits = api.search_books("herbert").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Dune");
}

#[test]
fn test_user_registry_through_api() {
    let (_temp_dir, api) = create_api();

    assert!(api
        .users()
        .create("42", UserRecord::new("Alice").with_handle("alice"))
        .unwrap());
    api.users().activate("42").unwrap();

    let user = api.users().get("42").unwrap().unwrap();
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(api.users().stats().unwrap().active, 1);
}

#[tokio::test]
async fn test_request_conversion_returns_existing_format() {
    let (temp_dir, api) = create_api();

    let epub = temp_dir.path().join("books").join("dune.epub");
    std::fs::write(&epub, b"epub bytes").unwrap();

    api.add_book(BookRecord::new("Dune").with_file(BookFormat::Epub, &epub))
        .unwrap();

    // Already stored: no conversion, no converter needed
    let path = api.request_conversion("Dune", BookFormat::Epub).await.unwrap();
    assert_eq!(path, epub);
}

#[tokio::test]
async fn test_request_conversion_without_any_source() {
    let (_temp_dir, api) = create_api();

    api.add_book(BookRecord::new("Empty")).unwrap();

    let err = api
        .request_conversion("Empty", BookFormat::Epub)
        .await
        .unwrap_err();
    assert!(matches!(err, BiblioError::SourceUnreadable { .. }));
}

/// The façade builds its locator from the app root, so a converter planted
/// in the bundled location is discovered without any injection.
#[cfg(unix)]
#[tokio::test]
async fn test_request_conversion_with_bundled_converter() {
    use std::os::unix::fs::PermissionsExt;

    let (temp_dir, api) = create_api();

    let bundled_dir = temp_dir.path().join("calibre-portable");
    std::fs::create_dir_all(&bundled_dir).unwrap();
    let converter = bundled_dir.join("ebook-convert");
    std::fs::write(&converter, "#!/bin/sh\ncp \"$1\" \"$2\"\n").unwrap();
    let mut permissions = std::fs::metadata(&converter).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&converter, permissions).unwrap();

    let fb2 = temp_dir.path().join("books").join("dune.fb2");
    std::fs::write(&fb2, b"<FictionBook/>").unwrap();

    api.add_book(BookRecord::new("Dune").with_file(BookFormat::Fb2, &fb2))
        .unwrap();

    let output = api.request_conversion("Dune", BookFormat::Epub).await.unwrap();
    assert_eq!(output, temp_dir.path().join("books").join("dune.epub"));
    assert!(output.exists());

    // The produced file is attached to the record
    let record = api.get_book("Dune").unwrap();
    assert_eq!(record.file_for(BookFormat::Epub), Some(output.as_path()));
}
