use std::path::{Path, PathBuf};

use punchbuggy_storage::{LocalBackend, StorageBackend};
use punchbuggy_types::error::{PunchError, Result};

/// A user-granted backup directory.
pub struct DirectoryHandle {
    pub name: String,
    pub path: PathBuf,
    pub storage: Box<dyn StorageBackend>,
}

impl std::fmt::Debug for DirectoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// How the directory engine obtains directory handles.
pub trait DirectoryAccess: Send + Sync {
    /// Whether an interactive picker exists at all.
    fn picker_available(&self) -> bool;

    /// Let the user choose a directory. `Err(Cancelled)` when dismissed.
    fn pick(&self) -> Result<DirectoryHandle>;

    /// Reopen a previously chosen directory.
    fn open(&self, path: &Path) -> Result<DirectoryHandle>;
}

pub type PickFn = Box<dyn Fn() -> Option<PathBuf> + Send + Sync>;

/// Local filesystem directories. The picker returns `None` when the user
/// backs out.
pub struct LocalDirectoryAccess {
    picker: Option<PickFn>,
}

impl LocalDirectoryAccess {
    pub fn new(picker: PickFn) -> Self {
        Self {
            picker: Some(picker),
        }
    }

    pub fn without_picker() -> Self {
        Self { picker: None }
    }
}

impl DirectoryAccess for LocalDirectoryAccess {
    fn picker_available(&self) -> bool {
        self.picker.is_some()
    }

    fn pick(&self) -> Result<DirectoryHandle> {
        let picker = self
            .picker
            .as_ref()
            .ok_or_else(|| PunchError::Unsupported("no directory picker available".into()))?;
        match picker() {
            Some(path) => self.open(&path),
            None => Err(PunchError::Cancelled),
        }
    }

    fn open(&self, path: &Path) -> Result<DirectoryHandle> {
        let backend = LocalBackend::new(path)?;
        Ok(DirectoryHandle {
            name: backend.display_name(),
            path: backend.root().to_path_buf(),
            storage: Box::new(backend),
        })
    }
}
