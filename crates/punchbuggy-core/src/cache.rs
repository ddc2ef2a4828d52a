use serde::de::DeserializeOwned;
use serde::Serialize;

use punchbuggy_storage::StorageBackend;

/// Fast local key/value mirror for synchronous status reads.
///
/// Every operation is best effort: failures are logged and swallowed, a
/// missing or unreadable entry reads as `None`.
pub struct LocalCache {
    storage: Box<dyn StorageBackend>,
}

impl LocalCache {
    pub fn new(storage: Box<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(key, error = %e, "cache entry is not UTF-8");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read cache entry");
                None
            }
        }
    }

    pub fn put_text(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.put(key, value.as_bytes()) {
            tracing::warn!(key, error = %e, "failed to write cache entry");
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = self.get_text(key)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "unable to parse cache entry");
                None
            }
        }
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(text) => self.put_text(key, &text),
            Err(e) => tracing::warn!(key, error = %e, "unable to encode cache entry"),
        }
    }

    /// `"true"`/`"false"` flags. Anything else reads as `false`.
    pub fn get_flag(&self, key: &str) -> Option<bool> {
        self.get_text(key).map(|v| v.trim() == "true")
    }

    pub fn put_flag(&self, key: &str, value: bool) {
        self.put_text(key, if value { "true" } else { "false" });
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.delete(key) {
            tracing::warn!(key, error = %e, "failed to remove cache entry");
        }
    }
}
