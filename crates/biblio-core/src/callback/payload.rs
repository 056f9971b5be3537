//! Button payload addressing.
//!
//! A payload is `prefix:token[:format]`: an action prefix from a fixed,
//! non-overlapping set, the title token, and a format qualifier where the
//! action needs one. The encoded form is ASCII and must stay under the
//! transport's hard 64-byte ceiling.

use crate::callback::token::encode_title;
use crate::catalog::BookFormat;
use crate::config::CallbackConfig;
use crate::{BiblioError, Result};

/// Action families a button can address.
///
/// Prefix strings are part of the wire format; they must stay distinct from
/// each other so routing never has to disambiguate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackPrefix {
    /// Show a book's card.
    BookShow,
    /// Download a book in a specific format (carries a format qualifier).
    BookDownload,
    /// Admin: edit a book's links.
    BookEdit,
    /// Admin: delete a book.
    BookDelete,
    /// Navigation: back to the book list.
    BackToBooks,
}

impl CallbackPrefix {
    pub const ALL: [CallbackPrefix; 5] = [
        CallbackPrefix::BookShow,
        CallbackPrefix::BookDownload,
        CallbackPrefix::BookEdit,
        CallbackPrefix::BookDelete,
        CallbackPrefix::BackToBooks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackPrefix::BookShow => "book_show",
            CallbackPrefix::BookDownload => "book_dl",
            CallbackPrefix::BookEdit => "book_edit",
            CallbackPrefix::BookDelete => "book_del",
            CallbackPrefix::BackToBooks => "back_books",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|prefix| prefix.as_str() == s)
    }

    /// Whether payloads of this family carry a format qualifier.
    pub fn takes_format(&self) -> bool {
        matches!(self, CallbackPrefix::BookDownload)
    }
}

/// A decoded button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub prefix: CallbackPrefix,
    pub token: String,
    pub format: Option<BookFormat>,
}

impl CallbackPayload {
    /// Build a payload addressing `title`.
    pub fn for_title(prefix: CallbackPrefix, title: &str, format: Option<BookFormat>) -> Self {
        Self {
            prefix,
            token: encode_title(title),
            format,
        }
    }

    /// Encode to the wire form, enforcing the transport ceiling.
    pub fn encode(&self) -> Result<String> {
        let mut payload = format!("{}:{}", self.prefix.as_str(), self.token);
        if let Some(format) = self.format {
            payload.push(':');
            payload.push_str(format.as_str());
        }

        if payload.len() > CallbackConfig::MAX_PAYLOAD_BYTES {
            return Err(BiblioError::Validation {
                field: "callback_data".to_string(),
                message: format!(
                    "payload is {} bytes, limit is {}",
                    payload.len(),
                    CallbackConfig::MAX_PAYLOAD_BYTES
                ),
            });
        }
        Ok(payload)
    }

    /// Parse a wire payload back into its components.
    pub fn parse(payload: &str) -> Result<Self> {
        let malformed = |message: String| BiblioError::Validation {
            field: "callback_data".to_string(),
            message,
        };

        let mut parts = payload.splitn(3, ':');
        let prefix = parts
            .next()
            .and_then(CallbackPrefix::from_str)
            .ok_or_else(|| malformed(format!("unknown payload prefix in {payload:?}")))?;
        let token = parts
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| malformed(format!("missing token in {payload:?}")))?
            .to_string();
        let format = match parts.next() {
            Some(raw) => Some(
                BookFormat::from_str(raw)
                    .ok_or_else(|| malformed(format!("unknown format {raw:?}")))?,
            ),
            None => None,
        };

        Ok(Self {
            prefix,
            token,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_prefixes_are_distinct() {
        let strings: HashSet<&str> = CallbackPrefix::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(strings.len(), CallbackPrefix::ALL.len());
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        let payload = CallbackPayload::for_title(
            CallbackPrefix::BookDownload,
            "Война и мир",
            Some(BookFormat::Epub),
        );
        let wire = payload.encode().unwrap();

        assert!(wire.is_ascii());
        assert!(wire.len() <= CallbackConfig::MAX_PAYLOAD_BYTES);
        assert_eq!(CallbackPayload::parse(&wire).unwrap(), payload);
    }

    #[test]
    fn test_arbitrarily_long_title_stays_under_ceiling() {
        let title = "и".repeat(10_000);
        let payload = CallbackPayload::for_title(CallbackPrefix::BookShow, &title, None);
        let wire = payload.encode().unwrap();
        assert!(wire.len() <= CallbackConfig::MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CallbackPayload::parse("no_such:abc123").is_err());
        assert!(CallbackPayload::parse("book_show:").is_err());
        assert!(CallbackPayload::parse("book_dl:abc123:wav").is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = CallbackPayload {
            prefix: CallbackPrefix::BookShow,
            token: "a".repeat(80),
            format: None,
        };
        assert!(matches!(
            payload.encode(),
            Err(BiblioError::Validation { .. })
        ));
    }
}
