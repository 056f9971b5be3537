//! Flat-file catalog store.
//!
//! One JSON file maps titles to book records. All reads go through the TTL
//! cache; every save atomically rewrites the file and invalidates the cache
//! entry so later readers observe the new contents.

use crate::callback::token::encode_title;
use crate::catalog::types::{BookFormat, BookLink, BookRecord};
use crate::config::StorageConfig;
use crate::store::{atomic_write_json, JsonFileCache};
use crate::{BiblioError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// The full set of book records, keyed by title.
///
/// A `BTreeMap` so that iteration order, and therefore the token-collision
/// tie-break, is deterministic.
pub type Catalog = BTreeMap<String, BookRecord>;

/// Store for the book catalog file.
pub struct CatalogStore {
    path: PathBuf,
    cache: JsonFileCache<Catalog>,
}

impl CatalogStore {
    /// Create a store over `path` with the default cache TTL.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: JsonFileCache::new(),
        }
    }

    /// Create a store with an explicit cache TTL.
    pub fn with_cache_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            cache: JsonFileCache::with_ttl(ttl),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog, served from cache when the entry is live.
    pub fn load(&self) -> Result<Catalog> {
        self.cache.read(&self.path)
    }

    /// Atomically rewrite the catalog file and invalidate the cache entry.
    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        atomic_write_json(&self.path, catalog, StorageConfig::KEEP_BACKUPS)?;
        self.cache.invalidate(&self.path);
        Ok(())
    }

    /// Look up a single record.
    pub fn get(&self, title: &str) -> Result<Option<BookRecord>> {
        Ok(self.load()?.get(title).cloned())
    }

    /// Insert or replace a record under its title.
    pub fn put(&self, record: BookRecord) -> Result<()> {
        record.validate()?;
        let mut catalog = self.load()?;
        let title = record.title.clone();
        catalog.insert(title.clone(), record);
        self.save(&catalog)?;
        info!("Stored catalog entry: {}", title);
        Ok(())
    }

    /// Remove a record, returning it if it existed.
    ///
    /// Only the record is removed; cleaning up its format files on disk is
    /// the caller's decision.
    pub fn delete(&self, title: &str) -> Result<Option<BookRecord>> {
        let mut catalog = self.load()?;
        let removed = catalog.remove(title);
        if removed.is_some() {
            self.save(&catalog)?;
            info!("Deleted catalog entry: {}", title);
        }
        Ok(removed)
    }

    /// All titles, in catalog iteration order.
    pub fn titles(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Reverse a callback token to its title by scanning the live catalog.
    ///
    /// Linear in the catalog size; if two titles ever truncate to the same
    /// token, the first match in iteration order wins.
    pub fn resolve_token(&self, token: &str) -> Result<Option<String>> {
        Ok(self
            .load()?
            .keys()
            .find(|title| encode_title(title) == token)
            .cloned())
    }

    /// Case-insensitive substring search over title, author, and description.
    pub fn search(&self, query: &str) -> Result<Vec<BookRecord>> {
        let needle = query.to_lowercase();
        Ok(self
            .load()?
            .into_values()
            .filter(|record| {
                record.title.to_lowercase().contains(&needle)
                    || record
                        .author
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
                    || record
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Books whose author contains `author`, case-insensitively.
    pub fn by_author(&self, author: &str) -> Result<Vec<BookRecord>> {
        let needle = author.to_lowercase();
        Ok(self
            .load()?
            .into_values()
            .filter(|record| {
                record
                    .author
                    .as_deref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Formats available for a title.
    pub fn formats(&self, title: &str) -> Result<Vec<BookFormat>> {
        Ok(self
            .get(title)?
            .map(|record| record.formats())
            .unwrap_or_default())
    }

    /// Attach a format file path to an existing record.
    pub fn set_format_file(
        &self,
        title: &str,
        format: BookFormat,
        file: impl Into<PathBuf>,
    ) -> Result<()> {
        self.update(title, |record| {
            record.files.insert(format, file.into());
        })
    }

    /// Detach a format from a record, returning the dropped path.
    pub fn remove_format_file(&self, title: &str, format: BookFormat) -> Result<Option<PathBuf>> {
        let mut dropped = None;
        self.update(title, |record| {
            dropped = record.files.remove(&format);
        })?;
        Ok(dropped)
    }

    /// Add (or replace, by label) an external reference link.
    pub fn set_link(&self, title: &str, link: BookLink) -> Result<()> {
        self.update(title, |record| {
            record.links.retain(|existing| existing.label != link.label);
            record.links.push(link);
        })
    }

    /// Remove a link by label, returning whether one existed.
    pub fn remove_link(&self, title: &str, label: &str) -> Result<bool> {
        let mut removed = false;
        self.update(title, |record| {
            let before = record.links.len();
            record.links.retain(|link| link.label != label);
            removed = record.links.len() != before;
        })?;
        Ok(removed)
    }

    /// Apply a mutation to an existing record and save.
    fn update(&self, title: &str, mutate: impl FnOnce(&mut BookRecord)) -> Result<()> {
        let mut catalog = self.load()?;
        let record = catalog
            .get_mut(title)
            .ok_or_else(|| BiblioError::BookNotFound {
                title: title.to_string(),
            })?;
        mutate(record);
        self.save(&catalog)
    }
}
