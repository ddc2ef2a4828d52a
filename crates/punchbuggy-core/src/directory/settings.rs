use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use punchbuggy_storage::StorageBackend;
use punchbuggy_types::error::Result;

use crate::metadata::BackupMetadata;

const HANDLE_KEY: &str = "directory.json";
const META_KEY: &str = "meta.json";

/// The persisted pointer to the chosen backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHandle {
    pub name: String,
    pub path: PathBuf,
}

/// Durable settings of the directory engine.
pub struct DirectorySettings {
    storage: Box<dyn StorageBackend>,
}

impl DirectorySettings {
    pub fn new(storage: Box<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub fn load_handle(&self) -> Result<Option<StoredHandle>> {
        self.load(HANDLE_KEY)
    }

    pub fn save_handle(&self, handle: &StoredHandle) -> Result<()> {
        self.save(HANDLE_KEY, handle)
    }

    pub fn load_meta(&self) -> Result<Option<BackupMetadata>> {
        self.load(META_KEY)
    }

    pub fn save_meta(&self, meta: &BackupMetadata) -> Result<()> {
        self.save(META_KEY, meta)
    }

    /// Forget the handle and the metadata.
    pub fn clear(&self) -> Result<()> {
        self.storage.delete(HANDLE_KEY)?;
        self.storage.delete(META_KEY)
    }

    fn load<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.storage.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.storage.put(key, &bytes)
    }
}
