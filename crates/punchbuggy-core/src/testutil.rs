use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use crossbeam_channel::{Receiver, Sender};

use punchbuggy_storage::MemoryBackend;
use punchbuggy_types::error::{PunchError, Result};
use punchbuggy_types::state::{ApplicationState, PlayerKey};

use crate::backend::BackupDeps;
use crate::cache::LocalCache;
use crate::capability::Capability;
use crate::clock::ManualClock;
use crate::config::{AutoBackupConfig, DirectoryBackupConfig};
use crate::directory::{DirectoryAccess, DirectoryBackup, DirectoryHandle, DirectorySettings};
use crate::hasher::ContentHasher;
use crate::source::{StateApplier, StateSource};
use crate::status::{StatusCallback, StatusCode, StatusRecord};
use crate::store::{rotation_plan, AutoBackup, GenerationStore, Generations, Slot, StoreSummary, StoredBackup};

/// 2024-05-01T08:00:00Z
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    ))
}

/// `{round:1, players:{A:{score:3}, B:{score:1}}, roundWinners:[], history:["x"]}`
pub fn sample_state() -> ApplicationState {
    let mut state = ApplicationState::default();
    state.players.a.score = 3;
    state.players.b.score = 1;
    state.history.push("x".to_string());
    state
}

/// Live state shared between the test and an engine.
#[derive(Default)]
pub struct SharedState {
    inner: Mutex<Option<ApplicationState>>,
    reject_apply: AtomicBool,
    held_read: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

/// Holds one engine read of the state open until released.
pub struct ReadGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl ReadGate {
    /// Block until the engine is inside `current_state`.
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("engine never read the state");
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl SharedState {
    pub fn with(state: ApplicationState) -> Arc<Self> {
        let shared = Arc::new(Self::default());
        shared.set(Some(state));
        shared
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, state: Option<ApplicationState>) {
        *self.inner.lock().unwrap() = state;
    }

    pub fn get(&self) -> Option<ApplicationState> {
        self.inner.lock().unwrap().clone()
    }

    /// Score one point for A, which changes the digest.
    pub fn bump(&self) {
        if let Some(state) = self.inner.lock().unwrap().as_mut() {
            state.score(PlayerKey::A, 1);
        }
    }

    pub fn reject_apply(&self) {
        self.reject_apply.store(true, Ordering::SeqCst);
    }

    /// The next `current_state` call blocks until the gate is released.
    pub fn hold_next_read(&self) -> ReadGate {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        *self.held_read.lock().unwrap() = Some((entered_tx, release_rx));
        ReadGate {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl StateSource for SharedState {
    fn current_state(&self) -> Option<ApplicationState> {
        let held = self.held_read.lock().unwrap().take();
        if let Some((entered, release)) = held {
            let _ = entered.send(());
            let _ = release.recv();
        }
        self.get()
    }
}

impl StateApplier for SharedState {
    fn apply_state(&self, state: ApplicationState) -> Result<()> {
        if self.reject_apply.load(Ordering::SeqCst) {
            return Err(PunchError::ApplyState("rejected by test".into()));
        }
        self.set(Some(state));
        Ok(())
    }
}

pub fn deps(state: &Arc<SharedState>, clock: &Arc<ManualClock>) -> BackupDeps {
    BackupDeps {
        source: Arc::clone(state) as Arc<dyn StateSource>,
        applier: Some(Arc::clone(state) as Arc<dyn StateApplier>),
        clock: Arc::clone(clock) as Arc<dyn crate::clock::Clock>,
        hasher: ContentHasher::default(),
        app_version: "1.2.3".to_string(),
    }
}

/// Every status record a backend published, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<StatusRecord>>>,
}

impl Recorder {
    pub fn callback(&self) -> StatusCallback {
        let seen = Arc::clone(&self.seen);
        Arc::new(move |record: &StatusRecord| seen.lock().unwrap().push(record.clone()))
    }

    pub fn codes(&self) -> Vec<StatusCode> {
        self.seen.lock().unwrap().iter().map(|r| r.code).collect()
    }

    pub fn last(&self) -> StatusRecord {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap().clear();
    }
}

pub fn memory_cache() -> Arc<LocalCache> {
    Arc::new(LocalCache::new(Box::new(MemoryBackend::new())))
}

/// Generation store held in memory. Shares the rotation plan with the real
/// store and can be told to fail the next rotations.
#[derive(Default)]
pub struct MemoryGenerationStore {
    generations: Mutex<Generations>,
    fail_rotation: AtomicBool,
    fail_load: AtomicBool,
}

impl MemoryGenerationStore {
    pub fn fail_rotation(&self, fail: bool) {
        self.fail_rotation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Generations {
        self.generations.lock().unwrap().clone()
    }
}

impl GenerationStore for MemoryGenerationStore {
    fn load(&self) -> Result<Generations> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(PunchError::Store("simulated read failure".into()));
        }
        Ok(self.snapshot())
    }

    fn rotate_in(&self, backup: &StoredBackup, summary: &StoreSummary) -> Result<()> {
        if self.fail_rotation.load(Ordering::SeqCst) {
            return Err(PunchError::Store("simulated transaction abort".into()));
        }
        let mut g = self.generations.lock().unwrap();
        let plan = rotation_plan(g.current.take(), g.previous.take(), backup.clone());
        for (slot, content) in plan {
            match slot {
                Slot::Current => g.current = content,
                Slot::Previous => g.previous = content,
                Slot::Oldest => g.oldest = content,
            }
        }
        g.summary = Some(summary.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.generations.lock().unwrap() = Generations::default();
        Ok(())
    }
}

impl GenerationStore for Arc<MemoryGenerationStore> {
    fn load(&self) -> Result<Generations> {
        self.as_ref().load()
    }

    fn rotate_in(&self, backup: &StoredBackup, summary: &StoreSummary) -> Result<()> {
        self.as_ref().rotate_in(backup, summary)
    }

    fn clear(&self) -> Result<()> {
        self.as_ref().clear()
    }
}

/// Directory access over one in-memory folder. The picker either returns
/// that folder or reports a cancellation.
pub struct MemoryDirectoryAccess {
    pub folder: Arc<MemoryBackend>,
    pub path: PathBuf,
    cancel_pick: AtomicBool,
}

impl MemoryDirectoryAccess {
    pub fn new(folder: Arc<MemoryBackend>) -> Self {
        Self {
            folder,
            path: PathBuf::from("/backups/punch"),
            cancel_pick: AtomicBool::new(false),
        }
    }

    pub fn cancel_next_pick(&self, cancel: bool) {
        self.cancel_pick.store(cancel, Ordering::SeqCst);
    }
}

impl DirectoryAccess for MemoryDirectoryAccess {
    fn picker_available(&self) -> bool {
        true
    }

    fn pick(&self) -> Result<DirectoryHandle> {
        if self.cancel_pick.load(Ordering::SeqCst) {
            return Err(PunchError::Cancelled);
        }
        self.open(&self.path)
    }

    fn open(&self, path: &Path) -> Result<DirectoryHandle> {
        Ok(DirectoryHandle {
            name: "punch".to_string(),
            path: path.to_path_buf(),
            storage: Box::new(Arc::clone(&self.folder)),
        })
    }
}

impl DirectoryAccess for Arc<MemoryDirectoryAccess> {
    fn picker_available(&self) -> bool {
        self.as_ref().picker_available()
    }

    fn pick(&self) -> Result<DirectoryHandle> {
        self.as_ref().pick()
    }

    fn open(&self, path: &Path) -> Result<DirectoryHandle> {
        self.as_ref().open(path)
    }
}

pub fn directory_config(max_daily_files: usize) -> DirectoryBackupConfig {
    DirectoryBackupConfig {
        debounce_ms: 200,
        max_daily_files,
        ..DirectoryBackupConfig::default()
    }
}

pub fn auto_config() -> AutoBackupConfig {
    AutoBackupConfig {
        debounce_ms: 200,
        ..AutoBackupConfig::default()
    }
}

/// Everything a directory-engine test needs to poke at.
pub struct DirectoryFixture {
    pub engine: Arc<DirectoryBackup>,
    pub access: Arc<MemoryDirectoryAccess>,
    pub folder: Arc<MemoryBackend>,
    pub settings: Arc<MemoryBackend>,
    pub cache: Arc<LocalCache>,
    pub state: Arc<SharedState>,
    pub clock: Arc<ManualClock>,
}

pub fn directory_fixture(state: Arc<SharedState>, max_daily_files: usize) -> DirectoryFixture {
    directory_fixture_with(
        state,
        Arc::new(MemoryBackend::new()),
        Arc::new(MemoryBackend::new()),
        max_daily_files,
    )
}

pub fn directory_fixture_with(
    state: Arc<SharedState>,
    folder: Arc<MemoryBackend>,
    settings: Arc<MemoryBackend>,
    max_daily_files: usize,
) -> DirectoryFixture {
    let clock = test_clock();
    let cache = memory_cache();
    let access = Arc::new(MemoryDirectoryAccess::new(Arc::clone(&folder)));
    let engine = DirectoryBackup::init(
        directory_config(max_daily_files),
        Box::new(Arc::clone(&access)),
        DirectorySettings::new(Box::new(Arc::clone(&settings))),
        Arc::clone(&cache),
        deps(&state, &clock),
    )
    .unwrap();
    DirectoryFixture {
        engine,
        access,
        folder,
        settings,
        cache,
        state,
        clock,
    }
}

pub struct AutoFixture {
    pub engine: Arc<AutoBackup>,
    pub store: Arc<MemoryGenerationStore>,
    pub cache: Arc<LocalCache>,
    pub state: Arc<SharedState>,
    pub clock: Arc<ManualClock>,
    pub export_dir: tempfile::TempDir,
}

pub fn auto_fixture(state: Arc<SharedState>) -> AutoFixture {
    auto_fixture_with(state, Arc::default(), memory_cache(), auto_config())
}

pub fn auto_fixture_with(
    state: Arc<SharedState>,
    store: Arc<MemoryGenerationStore>,
    cache: Arc<LocalCache>,
    config: AutoBackupConfig,
) -> AutoFixture {
    let clock = test_clock();
    let export_dir = tempfile::tempdir().unwrap();
    let engine = AutoBackup::init(
        config,
        Capability::Supported,
        Some(Box::new(Arc::clone(&store)) as Box<dyn GenerationStore>),
        Arc::clone(&cache),
        export_dir.path().to_path_buf(),
        deps(&state, &clock),
    )
    .unwrap();
    AutoFixture {
        engine,
        store,
        cache,
        state,
        clock,
        export_dir,
    }
}

/// Poll `condition` until it holds or `timeout_ms` passes.
pub fn wait_until(timeout_ms: u64, condition: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    condition()
}
