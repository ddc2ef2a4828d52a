use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use punchbuggy_core::app_state::AppStateStore;
use punchbuggy_core::backend::{select_primary, BackupBackend, BackupDeps};
use punchbuggy_core::cache::LocalCache;
use punchbuggy_core::capability::Capability;
use punchbuggy_core::clock::{Clock, SystemClock};
use punchbuggy_core::config::PunchConfig;
use punchbuggy_core::directory::{DirectoryBackup, DirectorySettings, LocalDirectoryAccess};
use punchbuggy_core::hasher::ContentHasher;
use punchbuggy_core::migrate::{migrate_if_needed, MigrationOutcome};
use punchbuggy_core::source::{StateApplier, StateSource};
use punchbuggy_core::status::StatusRecord;
use punchbuggy_core::store::{AutoBackup, GenerationStore, RedbGenerationStore};
use punchbuggy_storage::LocalBackend;
use punchbuggy_types::error::{PunchError, Result};

use crate::cli::EngineArg;
use crate::prompt::prompt_directory;

const APP_VERSION_ENV: &str = "PUNCHBUGGY_APP_VERSION";

/// Everything a command needs: the live state and both backup engines.
pub(crate) struct AppContext {
    pub config: PunchConfig,
    pub states: Arc<AppStateStore>,
    pub clock: Arc<dyn Clock>,
    pub directory: Arc<DirectoryBackup>,
    pub auto: Arc<AutoBackup>,
    /// Path handed to the directory picker instead of prompting.
    preset_directory: Arc<Mutex<Option<PathBuf>>>,
}

impl AppContext {
    /// Wire up storage and both engines. With `upgrade_state` a legacy stored
    /// state is migrated before either engine reads it.
    pub(crate) fn open(mut config: PunchConfig, upgrade_state: bool) -> Result<Self> {
        if config.app_version == "dev" {
            config.app_version = std::env::var(APP_VERSION_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let state_backend = LocalBackend::new(config.state_dir()?)?;
        if upgrade_state {
            match migrate_if_needed(&state_backend, clock.as_ref()) {
                Ok(MigrationOutcome::Migrated { backup_key }) => {
                    tracing::info!(backup = ?backup_key, "upgraded legacy game state");
                }
                Ok(MigrationOutcome::InvalidJson) => {
                    tracing::warn!("stored game state is not valid JSON; leaving it untouched");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "state migration failed"),
            }
        }
        let states = Arc::new(AppStateStore::new(Box::new(state_backend)));

        let cache = Arc::new(LocalCache::new(Box::new(LocalBackend::new(
            config.cache_dir()?,
        )?)));
        let deps = BackupDeps {
            source: Arc::clone(&states) as Arc<dyn StateSource>,
            applier: Some(Arc::clone(&states) as Arc<dyn StateApplier>),
            clock: Arc::clone(&clock),
            hasher: ContentHasher::new(config.hash),
            app_version: config.app_version.clone(),
        };

        let preset_directory: Arc<Mutex<Option<PathBuf>>> = Arc::default();
        let picker = {
            let preset = Arc::clone(&preset_directory);
            LocalDirectoryAccess::new(Box::new(move || {
                let chosen = preset.lock().ok().and_then(|mut p| p.take());
                chosen.or_else(prompt_directory)
            }))
        };
        let directory = DirectoryBackup::init(
            config.directory.clone(),
            Box::new(picker),
            DirectorySettings::new(Box::new(LocalBackend::new(
                config.directory_settings_dir()?,
            )?)),
            Arc::clone(&cache),
            deps.clone(),
        )?;

        let store_path = config.store_path()?;
        let capability = Capability::probe_store(&store_path);
        let store = if capability.is_supported() {
            match RedbGenerationStore::open(&store_path) {
                Ok(store) => Some(Box::new(store) as Box<dyn GenerationStore>),
                Err(e) => {
                    tracing::error!(path = %store_path.display(), error = %e, "unable to open backup store");
                    None
                }
            }
        } else {
            None
        };
        let auto = AutoBackup::init(
            config.auto_backup.clone(),
            capability,
            store,
            cache,
            config.export_dir()?,
            deps,
        )?;

        Ok(Self {
            config,
            states,
            clock,
            directory,
            auto,
            preset_directory,
        })
    }

    /// Both engines, the directory engine first.
    pub(crate) fn backends(&self) -> Vec<Arc<dyn BackupBackend>> {
        vec![
            Arc::clone(&self.directory) as Arc<dyn BackupBackend>,
            Arc::clone(&self.auto) as Arc<dyn BackupBackend>,
        ]
    }

    /// The requested engine, or the preferred available one.
    pub(crate) fn backend(&self, engine: Option<EngineArg>) -> Result<Arc<dyn BackupBackend>> {
        match engine {
            Some(EngineArg::Directory) => Ok(Arc::clone(&self.directory) as Arc<dyn BackupBackend>),
            Some(EngineArg::Auto) => Ok(Arc::clone(&self.auto) as Arc<dyn BackupBackend>),
            None => select_primary(&self.backends())
                .ok_or_else(|| PunchError::Unsupported("no backup engine is available".into())),
        }
    }

    /// Print every status transition to stderr from now on.
    pub(crate) fn follow_status(&self) {
        for backend in self.backends() {
            let kind = backend.kind();
            backend.subscribe(Arc::new(move |record: &StatusRecord| {
                eprintln!("[{kind}] {}", describe(record));
            }));
        }
    }

    pub(crate) fn set_preset_directory(&self, path: PathBuf) {
        if let Ok(mut preset) = self.preset_directory.lock() {
            *preset = Some(path);
        }
    }

    /// Tell both engines the game changed and run the resulting backups now.
    pub(crate) fn state_saved(&self, reason: &str) {
        for backend in self.backends() {
            backend.handle_store_save(reason);
            if let Some(outcome) = backend.flush_pending() {
                tracing::debug!(engine = %backend.kind(), %outcome, "flushed backup");
            }
        }
    }
}

pub(crate) fn describe(record: &StatusRecord) -> String {
    match &record.error {
        Some(err) => format!("{}: {} ({err})", record.code, record.message),
        None => format!("{}: {}", record.code, record.message),
    }
}
