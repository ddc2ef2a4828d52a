use std::path::{Path, PathBuf};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use punchbuggy_types::error::{PunchError, Result};

use super::slots::{rotation_plan, Generations, Slot, StoreSummary, StoredBackup};
use super::GenerationStore;

const BACKUPS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("backups");
const METADATA_KEY: &str = "metadata";

fn store_err(e: impl std::fmt::Display) -> PunchError {
    PunchError::Store(e.to_string())
}

/// Generation slots in a single-file `redb` database. Values are JSON.
pub struct RedbGenerationStore {
    db: Database,
    path: PathBuf,
}

impl RedbGenerationStore {
    /// Open or create the database and make sure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(store_err)?;
        let write_txn = db.begin_write().map_err(store_err)?;
        write_txn.open_table(BACKUPS_TABLE).map_err(store_err)?;
        write_txn.commit().map_err(store_err)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, bytes: Option<Vec<u8>>) -> Result<Option<T>> {
    match bytes {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PunchError::Store(format!("corrupt '{key}' record: {e}"))),
        None => Ok(None),
    }
}

impl GenerationStore for RedbGenerationStore {
    fn load(&self) -> Result<Generations> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(BACKUPS_TABLE).map_err(store_err)?;
        let get = |key: &str| -> Result<Option<Vec<u8>>> {
            Ok(table
                .get(key)
                .map_err(store_err)?
                .map(|guard| guard.value().to_vec()))
        };
        Ok(Generations {
            current: decode(Slot::Current.key(), get(Slot::Current.key())?)?,
            previous: decode(Slot::Previous.key(), get(Slot::Previous.key())?)?,
            oldest: decode(Slot::Oldest.key(), get(Slot::Oldest.key())?)?,
            summary: decode(METADATA_KEY, get(METADATA_KEY)?)?,
        })
    }

    fn rotate_in(&self, backup: &StoredBackup, summary: &StoreSummary) -> Result<()> {
        let new_bytes = serde_json::to_vec(backup)?;
        let summary_bytes = serde_json::to_vec(summary)?;

        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = write_txn.open_table(BACKUPS_TABLE).map_err(store_err)?;
            let current = table
                .get(Slot::Current.key())
                .map_err(store_err)?
                .map(|g| g.value().to_vec());
            let previous = table
                .get(Slot::Previous.key())
                .map_err(store_err)?
                .map(|g| g.value().to_vec());

            for (slot, content) in rotation_plan(current, previous, new_bytes) {
                match content {
                    Some(bytes) => {
                        table
                            .insert(slot.key(), bytes.as_slice())
                            .map_err(store_err)?;
                    }
                    None => {
                        table.remove(slot.key()).map_err(store_err)?;
                    }
                }
            }
            table
                .insert(METADATA_KEY, summary_bytes.as_slice())
                .map_err(store_err)?;
        }
        // Dropping an uncommitted transaction aborts it.
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = write_txn.open_table(BACKUPS_TABLE).map_err(store_err)?;
            for key in Slot::ALL.iter().map(|s| s.key()).chain([METADATA_KEY]) {
                table.remove(key).map_err(store_err)?;
            }
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }
}
