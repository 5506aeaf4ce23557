//! Device-local key-value storage.
//!
//! Holds the signed-in user's profile and the dark-mode preference in a
//! small JSON file. Values are stored JSON-encoded, one string per key.
//! Writes go to a temporary sibling first and are then renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::models::UserProfile;
use crate::{Result, SpendwiseError};

/// Keys known to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKey {
    User,
    DarkMode,
}

impl StoreKey {
    /// Returns the key name used in the store file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::DarkMode => "darkMode",
        }
    }
}

/// A JSON-file backed key-value store.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LocalStore {
    /// Opens the store at `path`. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`SpendwiseError::Store`] if the file exists but cannot be
    /// read or is not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SpendwiseError::Store(format!("{} is not a valid store: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(SpendwiseError::Store(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened local store");

        Ok(Self { path, entries })
    }

    /// Returns the raw JSON-encoded value of a key.
    pub fn get(&self, key: StoreKey) -> Option<&str> {
        self.entries.get(key.as_str()).map(String::as_str)
    }

    /// Stores a raw JSON-encoded value and persists the store.
    ///
    /// On a failed write the in-memory value is left as it was.
    pub fn set(&mut self, key: StoreKey, value: String) -> Result<()> {
        let previous = self.entries.insert(key.as_str().to_string(), value);
        self.persist().inspect_err(|_| self.restore(key, previous))
    }

    /// Removes a key and persists the store. Removing a missing key is fine.
    pub fn remove(&mut self, key: StoreKey) -> Result<()> {
        match self.entries.remove(key.as_str()) {
            Some(previous) => self
                .persist()
                .inspect_err(|_| self.restore(key, Some(previous))),
            None => Ok(()),
        }
    }

    fn restore(&mut self, key: StoreKey, previous: Option<String>) {
        match previous {
            Some(value) => self.entries.insert(key.as_str().to_string(), value),
            None => self.entries.remove(key.as_str()),
        };
    }

    /// The stored profile, or `None` if absent or unreadable.
    pub fn profile(&self) -> Option<UserProfile> {
        let raw = self.get(StoreKey::User)?;
        match serde_json::from_str(raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Ignoring unreadable stored profile: {e}");
                None
            }
        }
    }

    pub fn set_profile(&mut self, profile: &UserProfile) -> Result<()> {
        let value = serde_json::to_string(profile)?;
        self.set(StoreKey::User, value)
    }

    /// The dark-mode preference; `false` when unset or unreadable.
    pub fn dark_mode(&self) -> bool {
        self.get(StoreKey::DarkMode)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(false)
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<()> {
        self.set(StoreKey::DarkMode, enabled.to_string())
    }

    fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("tmp");

        fs::write(&tmp, content).map_err(|e| {
            SpendwiseError::Store(format!("failed to write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            SpendwiseError::Store(format!("failed to replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}
