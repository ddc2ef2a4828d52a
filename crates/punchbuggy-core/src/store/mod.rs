//! Automatic backups kept as three rotating generations in an embedded
//! transactional store.

mod redb_store;
pub mod slots;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use punchbuggy_types::error::{PunchError, Result};
use punchbuggy_types::state::ApplicationState;

use crate::backend::{
    BackendKind, BackupBackend, BackupDeps, BackupListing, BackupOutcome, BusyGuard,
};
use crate::cache::LocalCache;
use crate::capability::Capability;
use crate::clock::iso_timestamp;
use crate::config::AutoBackupConfig;
use crate::debounce::DebounceScheduler;
use crate::export;
use crate::metadata::BackupMetadata;
use crate::snapshot::SnapshotBuilder;
use crate::status::{
    StatusBaseline, StatusBroadcaster, StatusCallback, StatusCode, StatusRecord, StatusUpdate,
    SubscriptionId,
};

pub use self::redb_store::RedbGenerationStore;
pub use self::slots::{rotation_plan, Generations, Slot, StoreSummary, StoredBackup};

pub const ENABLED_KEY: &str = "punchbuggy-auto-backup-enabled";
pub const META_CACHE_KEY: &str = "punchbuggy-auto-backup-meta.json";

/// Durable home of the generation slots.
pub trait GenerationStore: Send + Sync {
    fn load(&self) -> Result<Generations>;

    /// Shift every slot down one generation and write `backup` as `current`,
    /// together with `summary`, in one transaction.
    fn rotate_in(&self, backup: &StoredBackup, summary: &StoreSummary) -> Result<()>;

    /// Remove all slots and the summary.
    fn clear(&self) -> Result<()>;
}

/// Metadata as implied by what the store currently holds.
pub fn metadata_from(generations: &Generations) -> BackupMetadata {
    let current = generations.current.as_ref();
    BackupMetadata {
        last_backup_at: generations
            .summary
            .as_ref()
            .map(|s| s.last_backup_at)
            .or_else(|| current.map(|b| b.saved_at)),
        last_daily_date: None,
        current_backup_date: current.map(|b| b.saved_at),
        previous_backup_date: generations.previous.as_ref().map(|b| b.saved_at),
        oldest_backup_date: generations.oldest.as_ref().map(|b| b.saved_at),
        latest_hash: generations
            .summary
            .as_ref()
            .map(|s| s.last_hash.clone())
            .or_else(|| current.map(|b| b.hash.clone())),
        backup_count: u32::try_from(generations.count()).unwrap_or(u32::MAX),
    }
}

struct AutoState {
    enabled: bool,
    /// Store opened and its metadata read at startup.
    ready: bool,
    meta: BackupMetadata,
}

pub struct AutoBackup {
    capability: Capability,
    store: Option<Box<dyn GenerationStore>>,
    cache: Arc<LocalCache>,
    export_dir: PathBuf,
    builder: SnapshotBuilder,
    deps: BackupDeps,
    broadcaster: StatusBroadcaster,
    scheduler: DebounceScheduler,
    busy: AtomicBool,
    state: Mutex<AutoState>,
}

impl AutoBackup {
    /// Build the engine and publish its first status.
    ///
    /// `store` is `None` when the store could not be opened; the engine then
    /// stays in the error state with automatic backups off.
    pub fn init(
        config: AutoBackupConfig,
        capability: Capability,
        store: Option<Box<dyn GenerationStore>>,
        cache: Arc<LocalCache>,
        export_dir: PathBuf,
        deps: BackupDeps,
    ) -> Result<Arc<Self>> {
        let builder = SnapshotBuilder::new(
            config.caps(),
            deps.app_version.clone(),
            deps.hasher,
            Arc::clone(&deps.clock),
        );

        let target: Arc<OnceLock<Weak<AutoBackup>>> = Arc::default();
        let scheduler = {
            let target = Arc::clone(&target);
            DebounceScheduler::spawn("auto-backup", config.debounce(), move |reason| {
                if let Some(engine) = target.get().and_then(Weak::upgrade) {
                    engine.run_backup(&reason);
                }
            })?
        };

        let enabled = cache.get_flag(ENABLED_KEY).unwrap_or(config.enabled);
        let meta: BackupMetadata = cache.get_json(META_CACHE_KEY).unwrap_or_default();
        let engine = Arc::new(Self {
            capability,
            store,
            cache,
            export_dir,
            builder,
            deps,
            broadcaster: StatusBroadcaster::new(
                "auto-backup",
                StatusRecord::new(StatusCode::Idle, "Automatic backups idle"),
            ),
            scheduler,
            busy: AtomicBool::new(false),
            state: Mutex::new(AutoState {
                enabled,
                ready: false,
                meta,
            }),
        });
        let _ = target.set(Arc::downgrade(&engine));

        if !engine.capability.is_supported() {
            engine.publish(
                StatusUpdate::new(
                    StatusCode::Unsupported,
                    "Automatic backups require an embedded store.",
                )
                .enabled(false),
            );
            return Ok(engine);
        }

        if engine.store.is_none() {
            engine.publish(
                StatusUpdate::new(StatusCode::Error, "Automatic backup initialization failed.")
                    .enabled(false)
                    .error("embedded store unavailable"),
            );
            return Ok(engine);
        }
        if let Err(e) = engine.reload_metadata() {
            tracing::error!(error = %e, "auto backup init failed");
            engine.publish(
                StatusUpdate::new(StatusCode::Error, "Automatic backup initialization failed.")
                    .enabled(false)
                    .error(&e),
            );
            return Ok(engine);
        }
        engine.lock_state().ready = true;

        if engine.is_enabled() {
            engine.publish_idle();
        } else {
            engine.publish_disabled();
        }
        Ok(engine)
    }

    pub fn is_enabled(&self) -> bool {
        self.lock_state().enabled
    }

    pub fn metadata(&self) -> BackupMetadata {
        self.lock_state().meta.clone()
    }

    /// Persist the user toggle.
    pub fn set_enabled(&self, enabled: bool) {
        let changed = {
            let mut state = self.lock_state();
            let changed = state.enabled != enabled;
            state.enabled = enabled;
            changed
        };
        if !changed {
            self.republish();
            return;
        }
        self.cache.put_flag(ENABLED_KEY, enabled);
        tracing::info!(enabled, "automatic backups toggled");

        if enabled {
            self.publish_idle();
            self.handle_store_save("enabled-toggle");
        } else {
            self.scheduler.cancel();
            self.publish_disabled();
        }
    }

    /// Write a one-off backup file into the export directory. Bypasses the
    /// generation slots.
    pub fn manual_backup(&self) -> Result<PathBuf> {
        let state = self.deps.source.current_state();
        let snapshot = self
            .builder
            .build(state.as_ref(), "manual-download")?
            .ok_or(PunchError::NoState)?;
        match export::write_manual_backup(&self.export_dir, &snapshot) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "manual backup written");
                self.publish(StatusUpdate::new(StatusCode::Downloaded, "Backup downloaded."));
                Ok(path)
            }
            Err(e) => {
                tracing::error!(error = %e, "manual backup failed");
                self.publish(StatusUpdate::new(StatusCode::Error, "Manual backup failed.").error(&e));
                Err(e)
            }
        }
    }

    /// Apply the snapshot kept in `slot_name` through the state applier.
    pub fn restore_from_backup(&self, slot_name: &str) -> Result<ApplicationState> {
        let slot: Slot = slot_name.parse()?;
        let store = self.store()?;
        let generations = store.load()?;
        let backup = generations
            .get(slot)
            .cloned()
            .ok_or_else(|| PunchError::EmptySlot(slot.to_string()))?;

        if let Some(applier) = &self.deps.applier {
            if let Err(e) = applier.apply_state(backup.data.clone()) {
                tracing::error!(slot = %slot, error = %e, "applying restored state failed");
                self.publish(StatusUpdate::new(StatusCode::Error, "Restore failed.").error(&e));
                return Err(e);
            }
        }
        tracing::info!(slot = %slot, saved_at = %iso_timestamp(&backup.saved_at), "backup restored");
        self.publish(StatusUpdate::new(
            StatusCode::Restored,
            format!(
                "Restored {slot} backup from {}.",
                iso_timestamp(&backup.saved_at)
            ),
        ));
        Ok(backup.data)
    }

    fn store(&self) -> Result<&dyn GenerationStore> {
        if !self.capability.is_supported() {
            return Err(PunchError::Unsupported(
                "automatic backups are not available".into(),
            ));
        }
        self.store
            .as_deref()
            .ok_or_else(|| PunchError::Store("embedded store unavailable".into()))
    }

    fn lock_state(&self) -> MutexGuard<'_, AutoState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn enabled(&self) -> bool {
        let state = self.lock_state();
        self.capability.is_supported() && state.ready && state.enabled
    }

    fn publish(&self, update: StatusUpdate) {
        let baseline = StatusBaseline {
            enabled: self.enabled(),
            pending: self.scheduler.is_pending(),
            metadata: self.metadata(),
            handle_name: None,
        };
        self.broadcaster.publish(update.merge(baseline));
    }

    fn republish(&self) {
        let current = self.broadcaster.current();
        let mut update = StatusUpdate::new(current.code, current.message);
        if let Some(e) = current.error {
            update = update.error(e);
        }
        self.publish(update);
    }

    fn publish_idle(&self) {
        let message = if self.metadata().current_backup_date.is_some() {
            "Automatic backups ready."
        } else {
            "Automatic backups will start after your next change."
        };
        self.publish(StatusUpdate::new(StatusCode::Idle, message));
    }

    fn publish_disabled(&self) {
        self.publish(
            StatusUpdate::new(
                StatusCode::Disabled,
                "Automatic backups are disabled by the user.",
            )
            .enabled(false),
        );
    }

    /// Re-read metadata from the store and mirror it to the cache.
    fn reload_metadata(&self) -> Result<BackupMetadata> {
        let generations = self.store()?.load()?;
        let meta = metadata_from(&generations);
        self.cache.put_json(META_CACHE_KEY, &meta);
        self.lock_state().meta = meta.clone();
        Ok(meta)
    }

    fn run_backup(&self, reason: &str) -> BackupOutcome {
        if !self.capability.is_supported() {
            return BackupOutcome::Unsupported;
        }
        if !self.is_enabled() {
            self.publish_disabled();
            return BackupOutcome::Disabled;
        }
        let store = match self.store.as_deref() {
            Some(store) if self.lock_state().ready => store,
            _ => return BackupOutcome::Failed("embedded store unavailable".into()),
        };
        let Some(_busy) = BusyGuard::try_claim(&self.busy) else {
            tracing::debug!(reason, "automatic backup already in progress, dropping request");
            return BackupOutcome::Busy;
        };

        match self.write_generation(store, reason) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(reason, error = %e, "automatic backup failed");
                self.publish(
                    StatusUpdate::new(StatusCode::Error, "Automatic backup failed.").error(&e),
                );
                BackupOutcome::Failed(e.to_string())
            }
        }
    }

    fn write_generation(&self, store: &dyn GenerationStore, reason: &str) -> Result<BackupOutcome> {
        let state = self.deps.source.current_state();
        let Some(snapshot) = self.builder.build(state.as_ref(), reason)? else {
            tracing::debug!(reason, "no state to back up");
            return Ok(BackupOutcome::NothingToBackUp);
        };

        if self.metadata().latest_hash.as_deref() == Some(snapshot.digest.as_str()) {
            self.publish(StatusUpdate::new(
                StatusCode::NoChange,
                "Backup skipped: no changes detected.",
            ));
            return Ok(BackupOutcome::Unchanged);
        }

        self.publish(StatusUpdate::new(StatusCode::Busy, "Saving automatic backup…"));
        let backup = StoredBackup::from(&snapshot);
        let summary = StoreSummary {
            last_backup_at: snapshot.saved_at,
            last_hash: snapshot.digest.clone(),
        };
        store.rotate_in(&backup, &summary)?;

        let meta = match self.reload_metadata() {
            Ok(meta) => meta,
            Err(e) => {
                // The rotation committed; keep metadata consistent with it.
                tracing::warn!(error = %e, "failed to reload metadata after backup");
                let mut state = self.lock_state();
                state.meta.last_backup_at = Some(snapshot.saved_at);
                state.meta.current_backup_date = Some(snapshot.saved_at);
                state.meta.latest_hash = Some(snapshot.digest.clone());
                state.meta.clone()
            }
        };

        tracing::info!(
            reason,
            digest = %snapshot.digest,
            generations = meta.backup_count,
            "automatic backup written"
        );
        self.publish(
            StatusUpdate::new(StatusCode::Success, "Backup saved successfully.")
                .last_backup_at(snapshot.saved_at),
        );
        Ok(BackupOutcome::Written {
            digest: snapshot.digest,
        })
    }
}

impl BackupBackend for AutoBackup {
    fn kind(&self) -> BackendKind {
        BackendKind::EmbeddedStore
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
        if !self.enabled() {
            return;
        }
        self.scheduler.notify(reason);
    }

    fn perform_backup(&self, reason: &str) -> BackupOutcome {
        self.run_backup(reason)
    }

    /// Occupied slots, newest first.
    fn list_backups(&self) -> Result<Vec<BackupListing>> {
        if !self.capability.is_supported() {
            return Ok(Vec::new());
        }
        let generations = self.store()?.load()?;
        Ok(Slot::ALL
            .into_iter()
            .filter_map(|slot| {
                generations.get(slot).map(|b| BackupListing {
                    id: slot.to_string(),
                    saved_at: Some(b.saved_at),
                    app_version: b.version.clone(),
                })
            })
            .collect())
    }

    fn restore(&self, id: &str) -> Result<ApplicationState> {
        self.restore_from_backup(id)
    }

    fn clear_backup_data(&self) -> Result<()> {
        self.scheduler.cancel();
        let store = self.store()?;
        if let Err(e) = store.clear() {
            tracing::error!(error = %e, "clearing automatic backups failed");
            self.publish(
                StatusUpdate::new(StatusCode::Error, "Unable to clear automatic backups.")
                    .error(&e),
            );
            return Err(e);
        }
        self.lock_state().meta = BackupMetadata::default();
        self.cache.remove(META_CACHE_KEY);
        self.publish(StatusUpdate::new(
            StatusCode::Idle,
            "Automatic backup history cleared.",
        ));
        Ok(())
    }

    fn cancel_pending(&self) {
        self.scheduler.cancel();
    }

    fn flush_pending(&self) -> Option<BackupOutcome> {
        self.scheduler
            .take_pending()
            .map(|reason| self.run_backup(&reason))
    }
}
