//! Catalog record types.

use crate::{BiblioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// E-book formats the catalog knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Fb2,
    Epub,
    Mobi,
    Pdf,
}

impl BookFormat {
    /// All formats, in canonical (source-preference) order.
    pub const ALL: [BookFormat; 4] = [
        BookFormat::Fb2,
        BookFormat::Epub,
        BookFormat::Mobi,
        BookFormat::Pdf,
    ];

    /// Formats the conversion pipeline produces for readers.
    pub const CONVERSION_TARGETS: [BookFormat; 2] = [BookFormat::Epub, BookFormat::Mobi];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Fb2 => "fb2",
            BookFormat::Epub => "epub",
            BookFormat::Mobi => "mobi",
            BookFormat::Pdf => "pdf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fb2" => Some(BookFormat::Fb2),
            "epub" => Some(BookFormat::Epub),
            "mobi" => Some(BookFormat::Mobi),
            "pdf" => Some(BookFormat::Pdf),
            _ => None,
        }
    }

    /// Recognize a format from a file's extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_str)
    }
}

impl std::fmt::Display for BookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named external reference for a book (store page, audio edition, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BookLink {
    pub label: String,
    pub url: String,
}

impl BookLink {
    /// Build a link, rejecting labels that are empty and URLs that don't parse.
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let url = url.into();

        if label.trim().is_empty() {
            return Err(BiblioError::Validation {
                field: "label".to_string(),
                message: "link label must not be empty".to_string(),
            });
        }
        url::Url::parse(&url).map_err(|e| BiblioError::Validation {
            field: "url".to_string(),
            message: format!("invalid url {url:?}: {e}"),
        })?;

        Ok(Self { label, url })
    }
}

/// A single catalog entry, keyed by its title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct BookRecord {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub links: Vec<BookLink>,
    /// Available formats and where their files live.
    #[serde(default)]
    pub files: BTreeMap<BookFormat, PathBuf>,
    /// RFC 3339 timestamp of when the record was created.
    #[serde(default)]
    pub added_date: Option<String>,
}

impl BookRecord {
    /// Create a record with the current timestamp.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            added_date: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_file(mut self, format: BookFormat, path: impl Into<PathBuf>) -> Self {
        self.files.insert(format, path.into());
        self
    }

    /// Formats this book is currently stored in.
    pub fn formats(&self) -> Vec<BookFormat> {
        self.files.keys().copied().collect()
    }

    /// Storage path for a format, if the book has it.
    pub fn file_for(&self, format: BookFormat) -> Option<&Path> {
        self.files.get(&format).map(PathBuf::as_path)
    }

    /// Description truncated for card rendering, on a char boundary.
    pub fn short_description(&self, max_chars: usize) -> Option<String> {
        let description = self.description.as_deref()?;
        if description.chars().count() <= max_chars {
            return Some(description.to_string());
        }
        let truncated: String = description.chars().take(max_chars).collect();
        Some(format!("{}…", truncated.trim_end()))
    }

    /// Check the record invariants that hold at rest.
    ///
    /// Format paths are deliberately not checked here; they are verified
    /// lazily at conversion time.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(BiblioError::Validation {
                field: "title".to_string(),
                message: "title must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
