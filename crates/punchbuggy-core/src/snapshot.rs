use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use punchbuggy_types::error::Result;
use punchbuggy_types::state::ApplicationState;

use crate::clock::{iso_millis, Clock};
use crate::hasher::ContentHasher;

/// Upper bounds applied to the unbounded lists of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionCaps {
    pub history: usize,
    pub rounds: usize,
}

/// A sealed, capped copy of the application state ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    #[serde(with = "iso_millis")]
    pub saved_at: DateTime<Utc>,
    pub app_version: String,
    pub reason: String,
    /// Digest of the compact JSON of `data`.
    pub digest: String,
    pub data: ApplicationState,
}

pub struct SnapshotBuilder {
    caps: RetentionCaps,
    app_version: String,
    hasher: ContentHasher,
    clock: Arc<dyn Clock>,
}

impl SnapshotBuilder {
    pub fn new(
        caps: RetentionCaps,
        app_version: impl Into<String>,
        hasher: ContentHasher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let app_version = app_version.into();
        let app_version = if app_version.trim().is_empty() {
            "dev".to_string()
        } else {
            app_version
        };
        Self {
            caps,
            app_version,
            hasher,
            clock,
        }
    }

    pub fn caps(&self) -> RetentionCaps {
        self.caps
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Build a snapshot of `state`. `None` means there is nothing to back up,
    /// which callers must not treat as a failure.
    pub fn build(
        &self,
        state: Option<&ApplicationState>,
        reason: &str,
    ) -> Result<Option<BackupSnapshot>> {
        let Some(state) = state else {
            return Ok(None);
        };
        let data = self.capped_copy(state);
        let digest = self.digest_of(&data)?;
        Ok(Some(BackupSnapshot {
            saved_at: self.clock.now(),
            app_version: self.app_version.clone(),
            reason: reason.to_string(),
            digest,
            data,
        }))
    }

    /// Owned copy of `state` with `history` and `round_winners` cut to their
    /// most recent entries.
    pub fn capped_copy(&self, state: &ApplicationState) -> ApplicationState {
        let mut data = state.clone();
        keep_last(&mut data.history, self.caps.history);
        keep_last(&mut data.round_winners, self.caps.rounds);
        data
    }

    pub fn digest_of(&self, data: &ApplicationState) -> Result<String> {
        let text = serde_json::to_string(data)?;
        Ok(self.hasher.hash(&text))
    }
}

fn keep_last<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        items.drain(..items.len() - cap);
    }
}
