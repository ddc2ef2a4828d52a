//! One-shot upgrade of a stored state written before schema versioning.

use serde_json::Value;

use punchbuggy_storage::StorageBackend;
use punchbuggy_types::error::Result;
use punchbuggy_types::state::{ApplicationState, SCHEMA_VERSION};

use crate::app_state::STATE_KEY;
use crate::clock::Clock;
use crate::import::{history_line, import_players, round_result};

pub const RAW_BACKUP_PREFIX: &str = "punchBuggy_backup_";
pub const LAST_BACKUP_POINTER: &str = "punchBuggy_last_backup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The state was rewritten. `backup_key` holds the raw pre-migration text
    /// unless writing it failed.
    Migrated { backup_key: Option<String> },
    AlreadyCurrent,
    NoState,
    InvalidJson,
}

/// Upgrade the state under [`STATE_KEY`] in place if it lacks the current
/// schema marker.
pub fn migrate_if_needed(storage: &dyn StorageBackend, clock: &dyn Clock) -> Result<MigrationOutcome> {
    let Some(raw) = storage.get(STATE_KEY)? else {
        return Ok(MigrationOutcome::NoState);
    };
    let parsed: Value = match serde_json::from_slice(&raw) {
        Ok(Value::Object(obj)) => Value::Object(obj),
        Ok(_) => return Ok(MigrationOutcome::InvalidJson),
        Err(e) => {
            tracing::warn!(error = %e, "stored state is not valid JSON, skipping migration");
            return Ok(MigrationOutcome::InvalidJson);
        }
    };
    if parsed.get("schemaVersion").and_then(Value::as_str) == Some(SCHEMA_VERSION) {
        return Ok(MigrationOutcome::AlreadyCurrent);
    }

    let backup_key = backup_raw_state(storage, clock, &raw);
    let migrated = migrate_value(&parsed);
    storage.put(STATE_KEY, &serde_json::to_vec(&migrated)?)?;
    tracing::info!(backup = ?backup_key, schema = SCHEMA_VERSION, "migrated stored state");
    Ok(MigrationOutcome::Migrated { backup_key })
}

/// Best effort: a failed raw backup does not block the migration.
fn backup_raw_state(storage: &dyn StorageBackend, clock: &dyn Clock, raw: &[u8]) -> Option<String> {
    let key = format!("{RAW_BACKUP_PREFIX}{}.json", clock.now().timestamp_millis());
    let written = storage
        .put(&key, raw)
        .and_then(|()| storage.put(LAST_BACKUP_POINTER, key.as_bytes()));
    match written {
        Ok(()) => Some(key),
        Err(e) => {
            tracing::warn!(key, error = %e, "raw state backup failed");
            None
        }
    }
}

/// Normalize a legacy state object and stamp the schema marker.
pub fn migrate_value(parsed: &Value) -> ApplicationState {
    let round = parsed
        .get("round")
        .and_then(Value::as_u64)
        .filter(|r| *r > 0)
        .map(|r| u32::try_from(r).unwrap_or(u32::MAX))
        .unwrap_or(1);
    let history = match parsed.get("history") {
        Some(Value::Array(items)) => items.iter().map(history_line).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(single) => vec![history_line(single)],
    };
    ApplicationState {
        round,
        players: import_players(parsed.get("players")),
        round_winners: parsed
            .get("roundWinners")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(round_result).collect())
            .unwrap_or_default(),
        history,
        schema_version: Some(SCHEMA_VERSION.to_string()),
    }
}
