//! Biblio Core - Headless library for the book-club catalog and conversion
//! pipeline.
//!
//! This crate provides the core functionality behind the library bot: the
//! book catalog and user registry (flat JSON files behind a TTL read-through
//! cache), callback-payload addressing for size-constrained button data, and
//! the format-conversion pipeline driving the external `ebook-convert` tool.
//! The chat transport, command routing, and conversation state live outside
//! this crate and talk to it through [`BiblioApi`].
//!
//! # Example
//!
//! ```rust,ignore
//! use biblio_core::{BiblioApi, BookFormat, BookRecord};
//!
//! #[tokio::main]
//! async fn main() -> biblio_core::Result<()> {
//!     let api = BiblioApi::new("/path/to/biblio")?;
//!
//!     api.add_book(BookRecord::new("Война и мир").with_author("Лев Толстой"))?;
//!
//!     // Convert the stored source into EPUB and attach the result
//!     let output = api.request_conversion("Война и мир", BookFormat::Epub).await?;
//!     println!("Converted to {}", output.display());
//!
//!     Ok(())
//! }
//! ```

pub mod callback;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod store;
pub mod users;

// Re-export commonly used types
pub use callback::{decode_title, encode_title, CallbackPayload, CallbackPrefix};
pub use cancel::CancellationToken;
pub use catalog::{BookFormat, BookLink, BookRecord, Catalog, CatalogStore};
pub use convert::{
    extract_source_document, ConversionManager, ConversionRequest, ConverterLocator, JobState,
    JobStatus,
};
pub use error::{BiblioError, Result};
pub use store::JsonFileCache;
pub use users::{UserRecord, UserStats, UserStatus, UserStore, Users};

use crate::config::StorageConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Main API struct for Biblio operations.
///
/// The primary entry point for programmatic access: wires the catalog and
/// user stores, the converter locator, and the conversion manager over one
/// application root. Components are explicit instances owned here (not
/// process-wide globals), so tests construct a fresh `BiblioApi` per fixture.
pub struct BiblioApi {
    app_root: PathBuf,
    catalog: CatalogStore,
    users: UserStore,
    conversions: ConversionManager,
}

impl BiblioApi {
    /// Create a new API instance rooted at `app_root`.
    ///
    /// Creates the data, uploads, and scratch directories if they are
    /// missing.
    pub fn new(app_root: impl Into<PathBuf>) -> Result<Self> {
        let app_root = app_root.into();

        let data_dir = app_root.join(StorageConfig::DATA_DIR_NAME);
        let uploads_dir = app_root.join(StorageConfig::UPLOADS_DIR_NAME);
        let scratch_dir = app_root.join(StorageConfig::SCRATCH_DIR_NAME);
        for dir in [&data_dir, &uploads_dir, &scratch_dir] {
            std::fs::create_dir_all(dir).map_err(|e| BiblioError::io_with_path(e, dir))?;
        }

        let catalog = CatalogStore::new(data_dir.join(StorageConfig::BOOKS_FILE_NAME));
        let users = UserStore::new(data_dir.join(StorageConfig::USERS_FILE_NAME));
        let locator = Arc::new(ConverterLocator::new(&app_root));
        let conversions = ConversionManager::new(locator, scratch_dir);

        Ok(Self {
            app_root,
            catalog,
            users,
            conversions,
        })
    }

    /// Application root directory.
    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// Directory book files are stored in.
    pub fn uploads_dir(&self) -> PathBuf {
        self.app_root.join(StorageConfig::UPLOADS_DIR_NAME)
    }

    /// The catalog store.
    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// The user registry.
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// The conversion manager.
    pub fn conversions(&self) -> &ConversionManager {
        &self.conversions
    }

    // ========================================
    // Catalog operations
    // ========================================

    /// All book records, in catalog order.
    pub fn list_books(&self) -> Result<Vec<BookRecord>> {
        Ok(self.catalog.load()?.into_values().collect())
    }

    /// Look up a book, failing with `BookNotFound` if it is missing.
    pub fn get_book(&self, title: &str) -> Result<BookRecord> {
        self.catalog
            .get(title)?
            .ok_or_else(|| BiblioError::BookNotFound {
                title: title.to_string(),
            })
    }

    /// Add a new book. Fails if a book with the same title already exists.
    pub fn add_book(&self, record: BookRecord) -> Result<()> {
        if self.catalog.get(&record.title)?.is_some() {
            return Err(BiblioError::Validation {
                field: "title".to_string(),
                message: format!("book already exists: {}", record.title),
            });
        }
        self.catalog.put(record)
    }

    /// Delete a book and remove its stored format files from disk.
    pub fn delete_book(&self, title: &str) -> Result<()> {
        let record = self
            .catalog
            .delete(title)?
            .ok_or_else(|| BiblioError::BookNotFound {
                title: title.to_string(),
            })?;

        for (format, path) in &record.files {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Failed to remove {} file {}: {}",
                        format,
                        path.display(),
                        e
                    );
                }
            }
        }
        Ok(())
    }

    /// Case-insensitive search over title, author, and description.
    pub fn search_books(&self, query: &str) -> Result<Vec<BookRecord>> {
        self.catalog.search(query)
    }

    // ========================================
    // Callback addressing
    // ========================================

    /// Build the wire payload for a button addressing `title`.
    pub fn book_payload(
        &self,
        prefix: CallbackPrefix,
        title: &str,
        format: Option<BookFormat>,
    ) -> Result<String> {
        CallbackPayload::for_title(prefix, title, format).encode()
    }

    /// Parse a wire payload and resolve its token against the live catalog.
    pub fn resolve_payload(&self, wire: &str) -> Result<(CallbackPayload, BookRecord)> {
        let payload = CallbackPayload::parse(wire)?;
        let title = self
            .catalog
            .resolve_token(&payload.token)?
            .ok_or_else(|| BiblioError::BookNotFound {
                title: payload.token.clone(),
            })?;
        let record = self.get_book(&title)?;
        Ok((payload, record))
    }

    // ========================================
    // Conversion operations
    // ========================================

    /// Produce `target` for a book, converting from its best stored source.
    ///
    /// Returns the stored path directly when the book already has the target
    /// format. On success the new file is attached to the record.
    pub async fn request_conversion(&self, title: &str, target: BookFormat) -> Result<PathBuf> {
        let record = self.get_book(title)?;

        if let Some(existing) = record.file_for(target) {
            if existing.exists() {
                return Ok(existing.to_path_buf());
            }
        }

        let (source_format, source) = conversion_source(&record, target)?;
        let request = ConversionRequest::new(source, source_format, target, self.uploads_dir());
        let output = self.conversions.convert(request).await?;

        self.catalog.set_format_file(title, target, &output)?;
        Ok(output)
    }

    /// Convert a book into every missing reader format, attaching each
    /// produced file. Returns the per-format outcomes.
    pub async fn ensure_reader_formats(
        &self,
        title: &str,
    ) -> Result<BTreeMap<BookFormat, Result<PathBuf>>> {
        let record = self.get_book(title)?;
        let missing: Vec<BookFormat> = BookFormat::CONVERSION_TARGETS
            .into_iter()
            .filter(|format| record.file_for(*format).is_none())
            .collect();
        if missing.is_empty() {
            return Ok(BTreeMap::new());
        }

        let (source_format, source) = conversion_source(&record, missing[0])?;
        let outcomes = self
            .conversions
            .convert_to_targets(&source, source_format, &self.uploads_dir(), &missing)
            .await;

        for (format, outcome) in &outcomes {
            if let Ok(path) = outcome {
                self.catalog.set_format_file(title, *format, path)?;
            }
        }
        Ok(outcomes)
    }
}

/// Pick the source file a conversion should start from: the first stored
/// format in canonical order that differs from the target.
fn conversion_source(record: &BookRecord, target: BookFormat) -> Result<(BookFormat, PathBuf)> {
    BookFormat::ALL
        .into_iter()
        .filter(|format| *format != target)
        .find_map(|format| {
            record
                .file_for(format)
                .map(|path| (format, path.to_path_buf()))
        })
        .ok_or_else(|| BiblioError::SourceUnreadable {
            message: format!("no stored source file for {}", record.title),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_api_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("biblio");
        let api = BiblioApi::new(&root).unwrap();

        assert_eq!(api.app_root(), root);
        assert!(root.join("data").is_dir());
        assert!(root.join("books").is_dir());
        assert!(root.join("temp").is_dir());
    }

    #[test]
    fn test_conversion_source_prefers_canonical_order() {
        let record = BookRecord::new("Dune")
            .with_file(BookFormat::Epub, "books/dune.epub")
            .with_file(BookFormat::Fb2, "books/dune.fb2");

        let (format, path) = conversion_source(&record, BookFormat::Mobi).unwrap();
        assert_eq!(format, BookFormat::Fb2);
        assert_eq!(path, PathBuf::from("books/dune.fb2"));

        // The target itself is never picked as the source
        let (format, _) = conversion_source(&record, BookFormat::Fb2).unwrap();
        assert_eq!(format, BookFormat::Epub);
    }

    #[test]
    fn test_conversion_source_missing() {
        let record = BookRecord::new("Dune");
        assert!(matches!(
            conversion_source(&record, BookFormat::Epub),
            Err(BiblioError::SourceUnreadable { .. })
        ));
    }
}
