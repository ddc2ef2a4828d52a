use serde_json::Value;

use punchbuggy_storage::StorageBackend;
use punchbuggy_types::error::Result;
use punchbuggy_types::state::{ApplicationState, SCHEMA_VERSION};

use crate::import::normalize_imported_state;
use crate::source::{StateApplier, StateSource};

/// Key of the live state inside the state directory.
pub const STATE_KEY: &str = "punchBuggy.json";

/// The persisted live game state.
pub struct AppStateStore {
    storage: Box<dyn StorageBackend>,
}

impl AppStateStore {
    pub fn new(storage: Box<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    /// Load the stored state. Entries in an older shape (bare round winner
    /// tags, missing counters) are normalized on the way in.
    pub fn load(&self) -> Result<Option<ApplicationState>> {
        let Some(bytes) = self.storage.get(STATE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<ApplicationState>(&bytes) {
            Ok(state) => Ok(Some(state)),
            Err(strict) => {
                tracing::debug!(error = %strict, "stored state needs normalizing");
                let value: Value = serde_json::from_slice(&bytes)?;
                normalize_imported_state(&value).map(Some)
            }
        }
    }

    /// Stored state, or a fresh game when nothing is stored yet.
    pub fn load_or_default(&self) -> Result<ApplicationState> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Persist `state`. A missing schema marker is stamped on the way out so
    /// the legacy migration never picks the entry up again.
    pub fn save(&self, state: &ApplicationState) -> Result<()> {
        let json = if state.schema_version.is_some() {
            serde_json::to_vec(state)?
        } else {
            let mut stamped = state.clone();
            stamped.schema_version = Some(SCHEMA_VERSION.to_string());
            serde_json::to_vec(&stamped)?
        };
        self.storage.put(STATE_KEY, &json)
    }

    /// Forget the stored game entirely.
    pub fn clear(&self) -> Result<()> {
        self.storage.delete(STATE_KEY)
    }

    /// Raw bytes of the stored state, for change detection.
    pub fn fingerprint(&self) -> Result<Option<Vec<u8>>> {
        self.storage.get(STATE_KEY)
    }
}

impl StateSource for AppStateStore {
    fn current_state(&self) -> Option<ApplicationState> {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "unable to read game state");
                None
            }
        }
    }
}

impl StateApplier for AppStateStore {
    fn apply_state(&self, state: ApplicationState) -> Result<()> {
        self.save(&state)
    }
}
