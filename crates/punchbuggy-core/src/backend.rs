use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use punchbuggy_types::error::{PunchError, Result};
use punchbuggy_types::state::ApplicationState;

use crate::capability::Capability;
use crate::clock::Clock;
use crate::hasher::ContentHasher;
use crate::source::{StateApplier, StateSource};
use crate::status::{StatusCallback, StatusRecord, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Files in a user-chosen directory.
    Directory,
    /// Generational slots in the embedded store.
    EmbeddedStore,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Directory => "directory",
            BackendKind::EmbeddedStore => "auto",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = PunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "directory" | "dir" => Ok(BackendKind::Directory),
            "auto" | "store" => Ok(BackendKind::EmbeddedStore),
            other => Err(PunchError::Other(format!(
                "unknown backup engine '{other}' (expected directory or auto)"
            ))),
        }
    }
}

/// What a single backup attempt did. Failures are reported here and through
/// an `error` status, never as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Written { digest: String },
    /// Digest matched the last backup; nothing was written.
    Unchanged,
    /// Another backup was in flight; this call was dropped.
    Busy,
    NotConnected,
    NeedsPermission,
    Disabled,
    Unsupported,
    NothingToBackUp,
    Failed(String),
}

impl BackupOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, BackupOutcome::Written { .. })
    }
}

impl fmt::Display for BackupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupOutcome::Written { digest } => write!(f, "written ({digest})"),
            BackupOutcome::Unchanged => f.write_str("unchanged"),
            BackupOutcome::Busy => f.write_str("busy"),
            BackupOutcome::NotConnected => f.write_str("not connected"),
            BackupOutcome::NeedsPermission => f.write_str("needs permission"),
            BackupOutcome::Disabled => f.write_str("disabled"),
            BackupOutcome::Unsupported => f.write_str("unsupported"),
            BackupOutcome::NothingToBackUp => f.write_str("nothing to back up"),
            BackupOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// One retained backup as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupListing {
    /// Identifier accepted by [`BackupBackend::restore`].
    pub id: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub app_version: String,
}

/// Collaborators shared by both engines.
#[derive(Clone)]
pub struct BackupDeps {
    pub source: Arc<dyn StateSource>,
    pub applier: Option<Arc<dyn StateApplier>>,
    pub clock: Arc<dyn Clock>,
    pub hasher: ContentHasher,
    pub app_version: String,
}

/// Common surface of the directory and embedded-store engines.
pub trait BackupBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capability(&self) -> Capability;

    fn status(&self) -> StatusRecord;

    fn subscribe(&self, callback: StatusCallback) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Signal that the live state changed; schedules a debounced backup.
    fn handle_store_save(&self, reason: &str);

    fn perform_backup(&self, reason: &str) -> BackupOutcome;

    fn list_backups(&self) -> Result<Vec<BackupListing>>;

    /// Read back the backup named `id`, hand it to the applier and return it.
    fn restore(&self, id: &str) -> Result<ApplicationState>;

    fn clear_backup_data(&self) -> Result<()>;

    fn cancel_pending(&self);

    /// Run a scheduled backup now instead of waiting for its deadline.
    fn flush_pending(&self) -> Option<BackupOutcome>;
}

/// First supported backend in preference order.
pub fn select_primary(backends: &[Arc<dyn BackupBackend>]) -> Option<Arc<dyn BackupBackend>> {
    backends
        .iter()
        .find(|b| b.capability().is_supported())
        .cloned()
}

/// Re-entrancy guard around `perform_backup`. Released on drop.
pub(crate) struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    pub(crate) fn try_claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
