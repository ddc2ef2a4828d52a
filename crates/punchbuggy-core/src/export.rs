//! One-off JSON files handed to the user: manual backups and plain exports.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use punchbuggy_storage::{LocalBackend, StorageBackend};
use punchbuggy_types::error::Result;
use punchbuggy_types::state::ApplicationState;

use crate::clock::{iso_millis, iso_timestamp, Clock};
use crate::snapshot::BackupSnapshot;

pub const APP_NAME: &str = "Punch Buggy";

/// Envelope of a manually downloaded backup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualBackupFile<'a> {
    pub app: &'static str,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    pub version: &'a str,
    pub data: &'a ApplicationState,
}

/// `punchbuggy-backup-2024-05-01T08-00-00.000Z.json`
pub fn manual_backup_file_name(created_at: &DateTime<Utc>) -> String {
    format!(
        "punchbuggy-backup-{}.json",
        iso_timestamp(created_at).replace(':', "-")
    )
}

pub fn export_file_name(now: &DateTime<Utc>) -> String {
    format!("punchbuggy-export-{}.json", now.timestamp_millis())
}

/// Write `snapshot` as a manual backup into `dir` and return the file path.
pub fn write_manual_backup(dir: &Path, snapshot: &BackupSnapshot) -> Result<PathBuf> {
    let file = ManualBackupFile {
        app: APP_NAME,
        created_at: snapshot.saved_at,
        version: &snapshot.app_version,
        data: &snapshot.data,
    };
    let json = serde_json::to_vec_pretty(&file)?;
    write_file(dir, &manual_backup_file_name(&snapshot.saved_at), &json)
}

/// Write the full, uncapped state into `dir`.
pub fn export_state(dir: &Path, state: &ApplicationState, clock: &dyn Clock) -> Result<PathBuf> {
    let json = serde_json::to_vec_pretty(state)?;
    write_file(dir, &export_file_name(&clock.now()), &json)
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let backend = LocalBackend::new(dir)?;
    backend.put(name, bytes)?;
    Ok(backend.root().join(name))
}
