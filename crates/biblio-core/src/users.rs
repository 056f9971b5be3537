//! Flat-file user registry.
//!
//! Same persistence shape as the catalog: one JSON file behind the TTL
//! read-through cache, atomically rewritten on every mutation.

use crate::config::StorageConfig;
use crate::store::{atomic_write_json, JsonFileCache};
use crate::{BiblioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Membership status of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Banned,
}

/// A registered user, keyed by the transport-assigned id rendered as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserRecord {
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
    pub status: UserStatus,
    /// RFC 3339 timestamp of first contact.
    pub registered_at: String,
    #[serde(default)]
    pub activated_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UserRecord {
    /// Create a record in the `Inactive` state with the current timestamp.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
            status: UserStatus::Inactive,
            registered_at: chrono::Utc::now().to_rfc3339(),
            activated_at: None,
            tags: Vec::new(),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

/// Per-status user counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub active: usize,
    pub inactive: usize,
    pub banned: usize,
}

/// The full user registry, keyed by user id.
pub type Users = BTreeMap<String, UserRecord>;

/// Store for the user registry file.
pub struct UserStore {
    path: PathBuf,
    cache: JsonFileCache<Users>,
}

impl UserStore {
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

    /// Load the registry, served from cache when the entry is live.
    pub fn load(&self) -> Result<Users> {
        self.cache.read(&self.path)
    }

    /// Atomically rewrite the registry file and invalidate the cache entry.
    pub fn save(&self, users: &Users) -> Result<()> {
        atomic_write_json(&self.path, users, StorageConfig::KEEP_BACKUPS)?;
        self.cache.invalidate(&self.path);
        Ok(())
    }

    /// Look up a single user.
    pub fn get(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.load()?.get(user_id).cloned())
    }

    /// Register a new user. Returns `false` if the id is already known.
    pub fn create(&self, user_id: &str, record: UserRecord) -> Result<bool> {
        let mut users = self.load()?;
        if users.contains_key(user_id) {
            return Ok(false);
        }
        users.insert(user_id.to_string(), record);
        self.save(&users)?;
        info!("Registered user {}", user_id);
        Ok(true)
    }

    /// Remove a user, returning whether one existed.
    pub fn delete(&self, user_id: &str) -> Result<bool> {
        let mut users = self.load()?;
        let existed = users.remove(user_id).is_some();
        if existed {
            self.save(&users)?;
        }
        Ok(existed)
    }

    /// Mark a user active, stamping the activation time on the first
    /// transition.
    pub fn activate(&self, user_id: &str) -> Result<()> {
        self.update(user_id, |record| {
            if record.status != UserStatus::Active {
                record.status = UserStatus::Active;
                record.activated_at = Some(chrono::Utc::now().to_rfc3339());
            }
        })
    }

    /// Ban a user.
    pub fn ban(&self, user_id: &str) -> Result<()> {
        self.update(user_id, |record| record.status = UserStatus::Banned)
    }

    /// Lift a ban, returning the user to the active state.
    pub fn unban(&self, user_id: &str) -> Result<()> {
        self.update(user_id, |record| record.status = UserStatus::Active)
    }

    /// Replace a user's tag set.
    pub fn set_tags(&self, user_id: &str, tags: Vec<String>) -> Result<()> {
        self.update(user_id, |record| record.tags = tags)
    }

    /// Ids of all active users, in registry order.
    pub fn active_users(&self) -> Result<Vec<String>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|(_, record)| record.status == UserStatus::Active)
            .map(|(id, _)| id)
            .collect())
    }

    /// Per-status counts across the registry.
    pub fn stats(&self) -> Result<UserStats> {
        let mut stats = UserStats::default();
        for record in self.load()?.values() {
            match record.status {
                UserStatus::Active => stats.active += 1,
                UserStatus::Inactive => stats.inactive += 1,
                UserStatus::Banned => stats.banned += 1,
            }
        }
        Ok(stats)
    }

    /// Apply a mutation to an existing user and save.
    fn update(&self, user_id: &str, mutate: impl FnOnce(&mut UserRecord)) -> Result<()> {
        let mut users = self.load()?;
        let record = users
            .get_mut(user_id)
            .ok_or_else(|| BiblioError::UserNotFound {
                user_id: user_id.to_string(),
            })?;
        mutate(record);
        self.save(&users)
    }
}
