//! Backups written as plain JSON files into a user-chosen directory.
//!
//! Every backup overwrites `punchbuggy-latest.json`; the first backup of each
//! UTC day also writes `punchbuggy-daily-<date>.json`, and the oldest daily
//! files are pruned down to a fixed cap.

mod access;
pub mod retention;
mod settings;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use punchbuggy_storage::{Permission, StorageBackend};
use punchbuggy_types::error::{PunchError, Result};
use punchbuggy_types::state::ApplicationState;

use crate::backend::{
    BackendKind, BackupBackend, BackupDeps, BackupListing, BackupOutcome, BusyGuard,
};
use crate::cache::LocalCache;
use crate::capability::Capability;
use crate::clock::{iso_millis_opt, iso_timestamp};
use crate::config::DirectoryBackupConfig;
use crate::debounce::DebounceScheduler;
use crate::metadata::BackupMetadata;
use crate::snapshot::{BackupSnapshot, SnapshotBuilder};
use crate::status::{
    StatusBaseline, StatusBroadcaster, StatusCallback, StatusCode, StatusRecord, StatusUpdate,
    SubscriptionId,
};

pub use self::access::{DirectoryAccess, DirectoryHandle, LocalDirectoryAccess, PickFn};
pub use self::retention::{daily_file_name, parse_daily_file_name, DAILY_PREFIX, LATEST_FILE};
pub use self::settings::{DirectorySettings, StoredHandle};

pub const META_CACHE_KEY: &str = "punchbuggy-backup-meta.json";

/// Reasons that come from automation rather than from the user.
const BACKGROUND_REASONS: [&str; 2] = ["auto", "state-change"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// May ask the user for access.
    User,
    /// Never escalates permission.
    Background,
}

impl Trigger {
    fn for_reason(reason: &str) -> Self {
        if BACKGROUND_REASONS.contains(&reason) {
            Trigger::Background
        } else {
            Trigger::User
        }
    }
}

#[derive(Default)]
struct DirState {
    handle: Option<Arc<DirectoryHandle>>,
    meta: BackupMetadata,
}

pub struct DirectoryBackup {
    capability: Capability,
    config: DirectoryBackupConfig,
    access: Box<dyn DirectoryAccess>,
    settings: DirectorySettings,
    cache: Arc<LocalCache>,
    builder: SnapshotBuilder,
    deps: BackupDeps,
    broadcaster: StatusBroadcaster,
    scheduler: DebounceScheduler,
    busy: AtomicBool,
    state: Mutex<DirState>,
}

impl DirectoryBackup {
    /// Probe capability, load cached metadata and reconnect the stored
    /// directory, if any.
    pub fn init(
        config: DirectoryBackupConfig,
        access: Box<dyn DirectoryAccess>,
        settings: DirectorySettings,
        cache: Arc<LocalCache>,
        deps: BackupDeps,
    ) -> Result<Arc<Self>> {
        let capability = Capability::probe_directory(access.picker_available());
        let builder = SnapshotBuilder::new(
            config.caps(),
            deps.app_version.clone(),
            deps.hasher,
            Arc::clone(&deps.clock),
        );

        let target: Arc<OnceLock<Weak<DirectoryBackup>>> = Arc::default();
        let scheduler = {
            let target = Arc::clone(&target);
            DebounceScheduler::spawn("directory-backup", config.debounce(), move |reason| {
                if let Some(engine) = target.get().and_then(Weak::upgrade) {
                    engine.run_backup(&reason, Trigger::Background);
                }
            })?
        };

        let meta: BackupMetadata = cache.get_json(META_CACHE_KEY).unwrap_or_default();
        let engine = Arc::new(Self {
            capability,
            config,
            access,
            settings,
            cache,
            builder,
            deps,
            broadcaster: StatusBroadcaster::new(
                "directory",
                StatusRecord::new(StatusCode::Idle, "Backups idle"),
            ),
            scheduler,
            busy: AtomicBool::new(false),
            state: Mutex::new(DirState { handle: None, meta }),
        });
        let _ = target.set(Arc::downgrade(&engine));

        if !engine.capability.is_supported() {
            engine.publish(StatusUpdate::new(
                StatusCode::Unsupported,
                "Backups require a directory picker.",
            ));
            return Ok(engine);
        }
        engine.publish(StatusUpdate::new(
            StatusCode::Initializing,
            "Checking backup folder…",
        ));
        engine.restore_handle();
        Ok(engine)
    }

    fn restore_handle(&self) {
        let stored = match self.settings.load_handle() {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                self.publish(StatusUpdate::new(
                    StatusCode::NoHandle,
                    "No backup folder connected.",
                ));
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load stored backup folder");
                self.publish(
                    StatusUpdate::new(StatusCode::Error, "Unable to restore backup folder")
                        .error(&e),
                );
                return;
            }
        };

        let handle = match self.access.open(&stored.path) {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                tracing::error!(path = %stored.path.display(), error = %e, "failed to reopen backup folder");
                self.publish(
                    StatusUpdate::new(StatusCode::Error, "Unable to restore backup folder")
                        .error(&e),
                );
                return;
            }
        };

        let granted = ensure_permission(&handle, false);
        let name = handle.name.clone();
        self.lock_state().handle = Some(handle);
        if granted {
            self.publish(StatusUpdate::new(
                StatusCode::Ready,
                format!("Connected to “{name}”."),
            ));
        } else {
            self.publish(StatusUpdate::new(
                StatusCode::NeedsPermission,
                format!("Re-authorize access to “{name}”."),
            ));
        }
    }

    /// Let the user pick a directory, remember it and run an initial backup.
    ///
    /// Returns `Ok(None)` when the user backed out.
    pub fn choose_directory(&self) -> Result<Option<BackupOutcome>> {
        if !self.capability.is_supported() {
            self.publish(StatusUpdate::new(
                StatusCode::Unsupported,
                "Backups require a directory picker.",
            ));
            return Err(PunchError::Unsupported(
                "directory backups are not available".into(),
            ));
        }

        let handle = match self.access.pick() {
            Ok(handle) => handle,
            Err(e) if e.is_cancelled() => {
                self.publish(StatusUpdate::new(
                    StatusCode::Cancelled,
                    "Backup folder selection cancelled.",
                ));
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(error = %e, "choose directory failed");
                self.publish(
                    StatusUpdate::new(StatusCode::Error, "Unable to select folder").error(&e),
                );
                return Err(e);
            }
        };

        let stored = StoredHandle {
            name: handle.name.clone(),
            path: handle.path.clone(),
        };
        if let Err(e) = self.settings.save_handle(&stored) {
            tracing::error!(error = %e, "failed to persist backup folder");
            self.publish(StatusUpdate::new(StatusCode::Error, "Unable to select folder").error(&e));
            return Err(e);
        }

        {
            let mut state = self.lock_state();
            let switched = state
                .handle
                .as_ref()
                .is_none_or(|current| current.path != handle.path);
            if switched {
                // A different folder has none of our files yet.
                state.meta.latest_hash = None;
                state.meta.last_daily_date = None;
            }
            state.handle = Some(Arc::new(handle));
        }
        let name = stored.name;
        self.publish(
            StatusUpdate::new(StatusCode::Ready, format!("Connected to “{name}”"))
                .handle_name(Some(name)),
        );
        Ok(Some(self.run_backup("initial-setup", Trigger::User)))
    }

    /// Back up now on the user's behalf.
    pub fn trigger_manual_backup(&self, reason: &str) -> BackupOutcome {
        if self.handle().is_none() {
            self.publish(StatusUpdate::new(
                StatusCode::NoHandle,
                "Connect a backup folder first.",
            ));
            return BackupOutcome::NotConnected;
        }
        self.run_backup(reason, Trigger::User)
    }

    /// Replace the in-memory and cached metadata with the durable copy.
    pub fn hydrate_meta_from_settings(&self) {
        match self.settings.load_meta() {
            Ok(Some(meta)) => {
                self.cache.put_json(META_CACHE_KEY, &meta);
                self.lock_state().meta = meta;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "hydrate meta error"),
        }
    }

    pub fn metadata(&self) -> BackupMetadata {
        self.lock_state().meta.clone()
    }

    pub fn handle_name(&self) -> Option<String> {
        self.handle().map(|h| h.name.clone())
    }

    fn handle(&self) -> Option<Arc<DirectoryHandle>> {
        self.lock_state().handle.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, DirState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn enabled(&self) -> bool {
        self.capability.is_supported() && self.config.enabled
    }

    fn publish(&self, update: StatusUpdate) {
        let baseline = {
            let state = self.lock_state();
            StatusBaseline {
                enabled: self.enabled(),
                pending: self.scheduler.is_pending(),
                metadata: state.meta.clone(),
                handle_name: state.handle.as_ref().map(|h| h.name.clone()),
            }
        };
        self.broadcaster.publish(update.merge(baseline));
    }

    fn run_backup(&self, reason: &str, trigger: Trigger) -> BackupOutcome {
        if !self.capability.is_supported() {
            return BackupOutcome::Unsupported;
        }
        if !self.config.enabled {
            self.publish(StatusUpdate::new(
                StatusCode::Disabled,
                "Directory backups are disabled in the configuration.",
            ));
            return BackupOutcome::Disabled;
        }
        let Some(handle) = self.handle() else {
            self.publish(StatusUpdate::new(
                StatusCode::NoHandle,
                "Connect a backup folder to enable automatic saves.",
            ));
            return BackupOutcome::NotConnected;
        };
        let Some(_busy) = BusyGuard::try_claim(&self.busy) else {
            tracing::debug!(reason, "backup already in progress, dropping request");
            return BackupOutcome::Busy;
        };

        if !ensure_permission(&handle, trigger == Trigger::User) {
            self.publish(StatusUpdate::new(
                StatusCode::NeedsPermission,
                "Backup folder needs permission.",
            ));
            return BackupOutcome::NeedsPermission;
        }

        self.publish(StatusUpdate::new(StatusCode::Busy, "Writing backup…"));
        match self.write_backup(&handle, reason) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(reason, folder = %handle.name, error = %e, "directory backup failed");
                self.publish(StatusUpdate::new(StatusCode::Error, "Backup failed").error(&e));
                BackupOutcome::Failed(e.to_string())
            }
        }
    }

    fn write_backup(&self, handle: &DirectoryHandle, reason: &str) -> Result<BackupOutcome> {
        let state = self.deps.source.current_state();
        let Some(snapshot) = self.builder.build(state.as_ref(), reason)? else {
            self.publish(StatusUpdate::new(StatusCode::Ready, "Nothing to back up yet."));
            return Ok(BackupOutcome::NothingToBackUp);
        };

        let mut meta = self.metadata();
        if meta.latest_hash.as_deref() == Some(snapshot.digest.as_str()) {
            let last = meta.last_backup_at.unwrap_or_else(|| self.builder.now());
            self.publish(
                StatusUpdate::new(StatusCode::UpToDate, "Backup already current.")
                    .last_backup_at(last),
            );
            return Ok(BackupOutcome::Unchanged);
        }

        let json = serde_json::to_vec_pretty(&snapshot)?;
        handle.storage.put(LATEST_FILE, &json)?;

        let today = snapshot.saved_at.date_naive();
        if meta.last_daily_date != Some(today) {
            handle.storage.put(&daily_file_name(today), &json)?;
            meta.last_daily_date = Some(today);
        }

        let report = retention::prune_daily_files(handle.storage.as_ref(), self.config.max_daily_files)?;

        meta.last_backup_at = Some(snapshot.saved_at);
        meta.current_backup_date = Some(snapshot.saved_at);
        meta.latest_hash = Some(snapshot.digest.clone());
        meta.backup_count = u32::try_from(report.retained).unwrap_or(u32::MAX);
        self.save_meta(&meta);
        self.lock_state().meta = meta;

        tracing::info!(
            reason,
            folder = %handle.name,
            digest = %snapshot.digest,
            daily_files = report.retained,
            "directory backup written"
        );
        self.publish(
            StatusUpdate::new(StatusCode::Success, "Backup saved.").last_backup_at(snapshot.saved_at),
        );
        Ok(BackupOutcome::Written {
            digest: snapshot.digest,
        })
    }

    /// Durable copy first, then the cache. Both are best effort.
    fn save_meta(&self, meta: &BackupMetadata) {
        if let Err(e) = self.settings.save_meta(meta) {
            tracing::warn!(error = %e, "failed to persist backup metadata");
        }
        self.cache.put_json(META_CACHE_KEY, meta);
    }

    fn resolve_backup_file(id: &str) -> Result<String> {
        if id == "latest" || id == LATEST_FILE {
            return Ok(LATEST_FILE.to_string());
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(id, "%Y-%m-%d") {
            return Ok(daily_file_name(date));
        }
        if parse_daily_file_name(id).is_some() {
            return Ok(id.to_string());
        }
        Err(PunchError::BackupNotFound(id.to_string()))
    }
}

/// Fields needed to list a backup file without trusting the rest of it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingHeader {
    #[serde(default, with = "iso_millis_opt")]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    app_version: Option<String>,
}

fn read_listing(storage: &dyn StorageBackend, file: &str, id: String) -> BackupListing {
    let header = match storage.get(file) {
        Ok(Some(bytes)) => serde_json::from_slice::<ListingHeader>(&bytes)
            .map_err(|e| tracing::warn!(file, error = %e, "unreadable backup file"))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(file, error = %e, "failed to read backup file");
            None
        }
    };
    BackupListing {
        id,
        saved_at: header.as_ref().and_then(|h| h.saved_at),
        app_version: header
            .and_then(|h| h.app_version)
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Query access, escalating to a request only for user-initiated calls.
fn ensure_permission(handle: &DirectoryHandle, request: bool) -> bool {
    let query = match handle.storage.query_permission() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(folder = %handle.name, error = %e, "ensure permission error");
            return false;
        }
    };
    match query {
        Permission::Granted => true,
        _ if !request => false,
        _ => match handle.storage.request_permission() {
            Ok(p) => p == Permission::Granted,
            Err(e) => {
                tracing::error!(folder = %handle.name, error = %e, "permission request failed");
                false
            }
        },
    }
}

impl BackupBackend for DirectoryBackup {
    fn kind(&self) -> BackendKind {
        BackendKind::Directory
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn status(&self) -> StatusRecord {
        let mut status = self.broadcaster.current();
        status.pending = self.scheduler.is_pending();
        status
    }

    fn subscribe(&self, callback: StatusCallback) -> SubscriptionId {
        self.broadcaster.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    fn handle_store_save(&self, reason: &str) {
        if !self.enabled() || self.handle().is_none() {
            return;
        }
        self.scheduler.notify(reason);
    }

    fn perform_backup(&self, reason: &str) -> BackupOutcome {
        self.run_backup(reason, Trigger::for_reason(reason))
    }

    /// `latest` first, then daily files newest first.
    fn list_backups(&self) -> Result<Vec<BackupListing>> {
        let handle = self.handle().ok_or(PunchError::NotConnected)?;
        let storage = handle.storage.as_ref();
        let mut listings = Vec::new();
        if storage.exists(LATEST_FILE)? {
            listings.push(read_listing(storage, LATEST_FILE, "latest".to_string()));
        }
        for name in retention::daily_files(storage)?.into_iter().rev() {
            let id = parse_daily_file_name(&name)
                .map(|d| d.to_string())
                .unwrap_or_else(|| name.clone());
            listings.push(read_listing(storage, &name, id));
        }
        Ok(listings)
    }

    fn restore(&self, id: &str) -> Result<ApplicationState> {
        let handle = self.handle().ok_or(PunchError::NotConnected)?;
        let file = Self::resolve_backup_file(id)?;
        let bytes = handle
            .storage
            .get(&file)?
            .ok_or_else(|| PunchError::BackupNotFound(id.to_string()))?;
        let snapshot: BackupSnapshot = serde_json::from_slice(&bytes)?;

        if let Some(applier) = &self.deps.applier {
            if let Err(e) = applier.apply_state(snapshot.data.clone()) {
                tracing::error!(backup = id, error = %e, "applying restored state failed");
                self.publish(StatusUpdate::new(StatusCode::Error, "Restore failed.").error(&e));
                return Err(e);
            }
        }
        self.publish(StatusUpdate::new(
            StatusCode::Restored,
            format!(
                "Restored {id} backup from {}.",
                iso_timestamp(&snapshot.saved_at)
            ),
        ));
        Ok(snapshot.data)
    }

    fn clear_backup_data(&self) -> Result<()> {
        self.scheduler.cancel();
        if let Err(e) = self.settings.clear() {
            tracing::error!(error = %e, "clear backup data error");
        }
        {
            let mut state = self.lock_state();
            state.handle = None;
            state.meta = BackupMetadata::default();
        }
        self.cache.remove(META_CACHE_KEY);
        self.publish(
            StatusUpdate::new(StatusCode::Disconnected, "Backup folder disconnected.")
                .handle_name(None),
        );
        Ok(())
    }

    fn cancel_pending(&self) {
        self.scheduler.cancel();
    }

    fn flush_pending(&self) -> Option<BackupOutcome> {
        self.scheduler
            .take_pending()
            .map(|reason| self.run_backup(&reason, Trigger::Background))
    }
}
