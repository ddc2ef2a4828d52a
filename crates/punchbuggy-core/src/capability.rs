use std::path::Path;

/// Result of the one-time startup probe for a backup engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported,
}

impl Capability {
    pub fn is_supported(self) -> bool {
        self == Capability::Supported
    }

    /// The directory engine needs some way for the user to pick a folder.
    pub fn probe_directory(picker_available: bool) -> Self {
        if picker_available {
            Capability::Supported
        } else {
            Capability::Unsupported
        }
    }

    /// The embedded store needs a writable parent directory for its file.
    pub fn probe_store(path: &Path) -> Self {
        let parent = match path.parent() {
            Some(p) if p.as_os_str().is_empty() => return Capability::Supported,
            Some(p) => p,
            None => return Capability::Unsupported,
        };
        match std::fs::create_dir_all(parent) {
            Ok(()) => Capability::Supported,
            Err(e) => {
                tracing::warn!(
                    path = %parent.display(),
                    error = %e,
                    "embedded store location is not usable"
                );
                Capability::Unsupported
            }
        }
    }
}
