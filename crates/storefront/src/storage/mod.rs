//! Local key-value persistence for the session.
//!
//! The session token and the serialized profile are the only things
//! persisted. [`SessionStorage`] wraps any [`KeyValueStore`] with the typed
//! operations the session store needs.

mod file;
mod memory;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::models::UserProfile;
use crate::models::session::keys;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data is not valid JSON.
    #[error("storage data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A minimal string key-value store.
///
/// Implementations must be safe to call from any task; calls are short and
/// never held across an `.await`.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Write several values as one change.
    ///
    /// Backends that can commit atomically should override this; the
    /// default writes the entries one by one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        entries.iter().try_for_each(|(key, value)| self.set(key, value))
    }

    /// Remove several values as one change.
    ///
    /// The default attempts every key and reports the first failure.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        keys.iter()
            .map(|key| self.remove(key))
            .fold(Ok(()), Result::and)
    }
}

/// Typed access to the persisted session.
#[derive(Clone)]
pub struct SessionStorage {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStorage {
    /// Wrap a key-value backend.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The stored token, if any. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn load_token(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self
            .store
            .get(keys::TOKEN)?
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from))
    }

    /// The stored profile, if any and if it still parses.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub fn load_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        let Some(raw) = self.store.get(keys::USER)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable stored profile");
                Ok(None)
            }
        }
    }

    /// Persist a complete session. Token and profile are written together.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn save(&self, token: &SecretString, profile: &UserProfile) -> Result<(), StorageError> {
        let raw = serde_json::to_string(profile)?;
        self.store
            .set_all(&[(keys::TOKEN, token.expose_secret()), (keys::USER, &raw)])
    }

    /// Persist only the profile, after a profile change.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let raw = serde_json::to_string(profile)?;
        self.store.set(keys::USER, &raw)
    }

    /// Remove every persisted session key.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` encountered.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove_all(&[keys::TOKEN, keys::USER])
    }
}
