//! Short-token encoding for book titles.
//!
//! Button payloads cannot carry arbitrary Unicode titles: the transport hard-
//! limits the address field to tens of bytes. Titles are therefore addressed
//! by a truncated cryptographic digest. Encoding is deterministic, so no
//! side-table of issued tokens is needed; the cost is that decoding is a
//! linear scan over the live catalog supplied by the caller.

use crate::config::CallbackConfig;
use sha2::{Digest, Sha256};

/// Encode a title into a fixed-length opaque token.
///
/// SHA-256 over the UTF-8 bytes, hex digest truncated to
/// [`CallbackConfig::TOKEN_LEN`] characters. Pure and total: any string
/// produces a token.
pub fn encode_title(title: &str) -> String {
    let digest = Sha256::digest(title.as_bytes());
    let mut token = hex::encode(digest);
    token.truncate(CallbackConfig::TOKEN_LEN);
    token
}

/// Reverse a token by scanning a closed candidate set.
///
/// Returns the first candidate (in iteration order) whose encoding matches,
/// or `None` if no candidate matches. First-match-wins is the documented
/// tie-break should two titles ever truncate to the same token.
pub fn decode_title<'a, I>(token: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .find(|title| encode_title(title) == token)
}
