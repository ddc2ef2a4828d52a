use thiserror::Error;

pub type Result<T> = std::result::Result<T, PunchError>;

#[derive(Debug, Error)]
pub enum PunchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsafe storage key: {0}")]
    InvalidKey(String),

    #[error("embedded store error: {0}")]
    Store(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("permission denied for '{0}'")]
    PermissionDenied(String),

    #[error("cancelled by user")]
    Cancelled,

    #[error("no backup folder connected")]
    NotConnected,

    #[error("unknown backup slot: '{0}'")]
    UnknownSlot(String),

    #[error("selected backup slot is empty: '{0}'")]
    EmptySlot(String),

    #[error("backup not found: '{0}'")]
    BackupNotFound(String),

    #[error("unable to collect app state for backup")]
    NoState,

    #[error("failed to apply restored state: {0}")]
    ApplyState(String),

    #[error("invalid import: {0}")]
    InvalidImport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl PunchError {
    /// User dismissals are reported as informational status, not failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PunchError::Cancelled)
    }
}
