use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use punchbuggy_types::error::{PunchError, Result};

use crate::{Permission, StorageBackend};

/// In-memory storage backend. Thread-safe via Mutex.
///
/// Also used by tests to simulate permission prompts and failing keys.
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Vec<u8>>>,
    permission: Mutex<Permission>,
    grant_on_request: bool,
    failing: Mutex<HashSet<String>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_permission(Permission::Granted, true)
    }

    /// Start in the given permission state. `grant_on_request` decides what
    /// a later `request_permission` call yields while the state is `Prompt`.
    pub fn with_permission(permission: Permission, grant_on_request: bool) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            permission: Mutex::new(permission),
            grant_on_request,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_permission(&self, permission: Permission) {
        *lock(&self.permission) = permission;
    }

    /// Make every write or delete of `key` fail.
    pub fn fail_key(&self, key: &str) {
        lock(&self.failing).insert(key.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.data).keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_failing(&self, key: &str) -> Result<()> {
        if lock(&self.failing).contains(key) {
            return Err(PunchError::Io(std::io::Error::other(format!(
                "simulated failure for '{key}'"
            ))));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(lock(&self.data).get(key).cloned())
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.check_failing(key)?;
        lock(&self.data).insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check_failing(key)?;
        lock(&self.data).remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(lock(&self.data).contains_key(key))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(lock(&self.data)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn query_permission(&self) -> Result<Permission> {
        Ok(*lock(&self.permission))
    }

    fn request_permission(&self) -> Result<Permission> {
        let mut state = lock(&self.permission);
        if *state == Permission::Prompt {
            *state = if self.grant_on_request {
                Permission::Granted
            } else {
                Permission::Denied
            };
        }
        Ok(*state)
    }
}
