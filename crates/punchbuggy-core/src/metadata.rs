use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::iso_millis_opt;

/// Bookkeeping about the most recent backups, mirrored between the durable
/// backend and the local cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupMetadata {
    #[serde(with = "iso_millis_opt")]
    pub last_backup_at: Option<DateTime<Utc>>,
    /// UTC date of the last daily file (directory engine).
    pub last_daily_date: Option<NaiveDate>,
    #[serde(with = "iso_millis_opt")]
    pub current_backup_date: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis_opt")]
    pub previous_backup_date: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis_opt")]
    pub oldest_backup_date: Option<DateTime<Utc>>,
    pub latest_hash: Option<String>,
    pub backup_count: u32,
}

impl BackupMetadata {
    pub fn has_backup(&self) -> bool {
        self.last_backup_at.is_some() || self.current_backup_date.is_some()
    }
}
