use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use punchbuggy_types::error::{PunchError, Result};

use crate::{Permission, StorageBackend};

/// Storage backend over a single local directory using `std::fs` directly.
///
/// Listing is flat: only regular files directly inside the root are returned.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at the given directory path. The directory
    /// does not need to exist yet.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root_path = root.as_ref().to_path_buf();
        // Canonicalize when possible so symlinked roots list correctly.
        let root = if root_path.exists() {
            fs::canonicalize(&root_path)?
        } else {
            root_path
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last path component of the root, used as a display name.
    pub fn display_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    /// Reject keys that could escape the root directory.
    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(PunchError::InvalidKey("empty".into()));
        }
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(PunchError::InvalidKey(format!("absolute path '{key}'")));
        }
        if key.contains('\\') {
            return Err(PunchError::InvalidKey(format!("contains backslash '{key}'")));
        }
        if Path::new(key)
            .components()
            .any(|c| c == Component::ParentDir)
        {
            return Err(PunchError::InvalidKey(format!("parent traversal '{key}'")));
        }
        Ok(())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Write to a temp file next to the target, then rename into place so
    /// readers never observe a partial file.
    fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StorageBackend for LocalBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        match self.atomic_write(&path, data) {
            Err(PunchError::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                self.atomic_write(&path, data)
            }
            other => other,
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) {
                keys.push(name);
            }
        }
        Ok(keys)
    }

    fn query_permission(&self) -> Result<Permission> {
        match fs::metadata(&self.root) {
            Ok(meta) if !meta.is_dir() => Ok(Permission::Denied),
            Ok(meta) if meta.permissions().readonly() => Ok(Permission::Denied),
            Ok(_) => Ok(Permission::Granted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Permission::Prompt),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Ok(Permission::Denied)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn request_permission(&self) -> Result<Permission> {
        match self.query_permission()? {
            Permission::Prompt => match fs::create_dir_all(&self.root) {
                Ok(()) => Ok(Permission::Granted),
                Err(e) => {
                    tracing::warn!(
                        path = %self.root.display(),
                        error = %e,
                        "failed to create backup directory"
                    );
                    Ok(Permission::Denied)
                }
            },
            other => Ok(other),
        }
    }
}
