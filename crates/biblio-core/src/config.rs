//! Centralized configuration for the Biblio library.
//!
//! Configuration constants for storage layout, caching, callback payload
//! limits, and the conversion pipeline.

use std::time::Duration;

/// Storage layout under the data root.
pub struct StorageConfig;

impl StorageConfig {
    pub const DATA_DIR_NAME: &'static str = "data";
    pub const BOOKS_FILE_NAME: &'static str = "books.json";
    pub const USERS_FILE_NAME: &'static str = "users.json";
    pub const UPLOADS_DIR_NAME: &'static str = "books";
    pub const SCRATCH_DIR_NAME: &'static str = "temp";
    /// Keep a `.bak` sibling when rewriting a store file.
    pub const KEEP_BACKUPS: bool = true;
}

/// Read-through cache behavior.
pub struct CacheConfig;

impl CacheConfig {
    /// Maximum age at which a cached store payload may be served without a
    /// disk reload.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);
    /// One entry per store file; the map never holds more than a handful.
    pub const MAX_ENTRIES: u64 = 16;
}

/// Callback payload addressing.
pub struct CallbackConfig;

impl CallbackConfig {
    /// Hard transport ceiling on an encoded payload, in bytes.
    pub const MAX_PAYLOAD_BYTES: usize = 64;
    /// Hex characters kept from the title digest.
    pub const TOKEN_LEN: usize = 16;
}

/// Conversion pipeline tuning.
pub struct ConversionConfig;

impl ConversionConfig {
    /// Base subprocess timeout before size scaling.
    pub const BASE_TIMEOUT: Duration = Duration::from_secs(60);
    /// Extra allowance per MiB of source material.
    pub const TIMEOUT_PER_MIB: Duration = Duration::from_secs(1);
    /// Cap on concurrently running converter subprocesses.
    pub const MAX_CONCURRENT: usize = 2;
    /// Interval at which a running job polls its cancellation token.
    pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);
    /// Directory names probed for a bundled converter, relative to the
    /// application root, in preference order.
    pub const BUNDLED_DIR_NAMES: [&'static str; 2] = ["calibre-portable", "calibre-portable/calibre"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_fits_payload_with_longest_prefix() {
        // prefix + ':' + token + ':' + format must stay under the ceiling
        let worst = "back_books".len() + 1 + CallbackConfig::TOKEN_LEN + 1 + "epub".len();
        assert!(worst <= CallbackConfig::MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(ConversionConfig::BASE_TIMEOUT >= Duration::from_secs(10));
        assert!(CacheConfig::DEFAULT_TTL > Duration::ZERO);
    }
}
