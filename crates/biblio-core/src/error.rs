//! Error types for the Biblio library.
//!
//! One crate-wide error enum so callers can branch on the failure kind to
//! decide user messaging ("format not supported here" vs "please retry").

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Biblio library.
#[derive(Debug, Error)]
pub enum BiblioError {
    // Lookup misses
    #[error("Book not found: {title}")]
    BookNotFound { title: String },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    // Conversion pipeline
    #[error("No usable ebook-convert executable was found")]
    ConverterUnavailable,

    #[error("Archive is unreadable: {path}")]
    CorruptArchive { path: PathBuf, detail: String },

    #[error("No convertible document inside archive: {path}")]
    NoMatchingMember { path: PathBuf },

    #[error("Source is unreadable: {message}")]
    SourceUnreadable { message: String },

    #[error("Conversion failed: {message}")]
    ConversionFailed { message: String },

    #[error("Conversion timed out after {0:?}")]
    ConversionTimedOut(std::time::Duration),

    #[error("Conversion cancelled")]
    ConversionCancelled,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Biblio operations.
pub type Result<T> = std::result::Result<T, BiblioError>;

// Conversion implementations for common error types

impl From<std::io::Error> for BiblioError {
    fn from(err: std::io::Error) -> Self {
        BiblioError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BiblioError {
    fn from(err: serde_json::Error) -> Self {
        BiblioError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BiblioError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        BiblioError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for failures where asking the user to retry later makes sense,
    /// as opposed to failures that will repeat deterministically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BiblioError::ConversionTimedOut(_) | BiblioError::ConversionFailed { .. }
        )
    }

    /// True for failures caused by the uploaded/selected source material
    /// rather than by the host environment.
    pub fn is_source_problem(&self) -> bool {
        matches!(
            self,
            BiblioError::CorruptArchive { .. }
                | BiblioError::NoMatchingMember { .. }
                | BiblioError::SourceUnreadable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BiblioError::BookNotFound {
            title: "War and Peace".into(),
        };
        assert_eq!(err.to_string(), "Book not found: War and Peace");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(
            BiblioError::ConversionTimedOut(std::time::Duration::from_secs(60)).is_retryable()
        );
        assert!(!BiblioError::ConverterUnavailable.is_retryable());
    }

    #[test]
    fn test_source_problem_classification() {
        assert!(BiblioError::NoMatchingMember {
            path: PathBuf::from("book.zip")
        }
        .is_source_problem());
        assert!(!BiblioError::ConverterUnavailable.is_source_problem());
    }
}
