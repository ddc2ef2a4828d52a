pub mod local_backend;
pub mod memory_backend;
pub mod paths;

use std::sync::Arc;

use punchbuggy_types::error::Result;

pub use local_backend::LocalBackend;
pub use memory_backend::MemoryBackend;

/// Access state of a storage location, mirroring a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Access has not been decided yet and may be requested.
    Prompt,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Granted => "granted",
            Permission::Denied => "denied",
            Permission::Prompt => "prompt",
        }
    }
}

/// Flat key/value storage for backup files and settings.
///
/// Keys are `/`-free file names for directory-backed stores. All methods
/// are synchronous; callers that need concurrency share the backend
/// through an `Arc`.
pub trait StorageBackend: Send + Sync {
    /// Read an object. Returns `None` if it does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write an object, replacing any previous content.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Delete an object. Missing objects are not an error.
    fn delete(&self, key: &str) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// List keys starting with `prefix`. Order is unspecified.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Current access state, without side effects.
    fn query_permission(&self) -> Result<Permission> {
        Ok(Permission::Granted)
    }

    /// Ask for access. Only called from user-initiated flows.
    fn request_permission(&self) -> Result<Permission> {
        Ok(Permission::Granted)
    }
}

impl<T: StorageBackend + ?Sized> StorageBackend for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        (**self).put(key, data)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list(prefix)
    }

    fn query_permission(&self) -> Result<Permission> {
        (**self).query_permission()
    }

    fn request_permission(&self) -> Result<Permission> {
        (**self).request_permission()
    }
}
