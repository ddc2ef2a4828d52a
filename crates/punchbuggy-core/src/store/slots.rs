use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use punchbuggy_types::error::PunchError;
use punchbuggy_types::state::ApplicationState;

use crate::clock::iso_millis;
use crate::snapshot::BackupSnapshot;

/// One of the three retained generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Current,
    Previous,
    Oldest,
}

impl Slot {
    /// Newest to oldest.
    pub const ALL: [Slot; 3] = [Slot::Current, Slot::Previous, Slot::Oldest];

    pub fn key(self) -> &'static str {
        match self {
            Slot::Current => "current",
            Slot::Previous => "previous",
            Slot::Oldest => "oldest",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Slot {
    type Err = PunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.key() == s)
            .ok_or_else(|| PunchError::UnknownSlot(s.to_string()))
    }
}

/// A snapshot as kept in a generation slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBackup {
    #[serde(with = "iso_millis")]
    pub saved_at: DateTime<Utc>,
    pub hash: String,
    pub version: String,
    pub reason: String,
    pub data: ApplicationState,
}

impl From<&BackupSnapshot> for StoredBackup {
    fn from(snapshot: &BackupSnapshot) -> Self {
        Self {
            saved_at: snapshot.saved_at,
            hash: snapshot.digest.clone(),
            version: snapshot.app_version.clone(),
            reason: snapshot.reason.clone(),
            data: snapshot.data.clone(),
        }
    }
}

/// Summary record written in the same transaction as the rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    #[serde(with = "iso_millis")]
    pub last_backup_at: DateTime<Utc>,
    pub last_hash: String,
}

/// Everything the store holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generations {
    pub current: Option<StoredBackup>,
    pub previous: Option<StoredBackup>,
    pub oldest: Option<StoredBackup>,
    pub summary: Option<StoreSummary>,
}

impl Generations {
    pub fn get(&self, slot: Slot) -> Option<&StoredBackup> {
        match slot {
            Slot::Current => self.current.as_ref(),
            Slot::Previous => self.previous.as_ref(),
            Slot::Oldest => self.oldest.as_ref(),
        }
    }

    pub fn count(&self) -> usize {
        Slot::ALL.iter().filter(|s| self.get(**s).is_some()).count()
    }
}

/// The writes a rotation performs, as `(slot, new content)` pairs.
///
/// `previous` moves to `oldest` and `current` moves to `previous`; an empty
/// source empties its target. The prior `oldest` is always dropped.
pub fn rotation_plan<T>(current: Option<T>, previous: Option<T>, new: T) -> [(Slot, Option<T>); 3] {
    [
        (Slot::Oldest, previous),
        (Slot::Previous, current),
        (Slot::Current, Some(new)),
    ]
}
