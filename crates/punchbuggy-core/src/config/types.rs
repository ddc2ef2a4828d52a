use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use punchbuggy_storage::paths;
use punchbuggy_types::error::{PunchError, Result};

use super::defaults::*;
use super::util::expand_tilde;
use crate::hasher::HashAlgorithm;
use crate::snapshot::RetentionCaps;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PunchConfig {
    /// Version string stamped into every snapshot.
    #[serde(default = "default_app_version")]
    pub app_version: String,
    /// Root for the live state, directory-backup settings and the store.
    /// Default: platform data dir + "punchbuggy".
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Fast metadata mirror. Default: platform cache dir + "punchbuggy".
    #[serde(default)]
    pub cache_dir: Option<String>,
    /// Where downloads and exports land. Default: the user's download dir.
    #[serde(default)]
    pub export_dir: Option<String>,
    #[serde(default)]
    pub hash: HashAlgorithm,
    #[serde(default)]
    pub directory: DirectoryBackupConfig,
    #[serde(default)]
    pub auto_backup: AutoBackupConfig,
}

impl Default for PunchConfig {
    fn default() -> Self {
        Self {
            app_version: default_app_version(),
            data_dir: None,
            cache_dir: None,
            export_dir: None,
            hash: HashAlgorithm::default(),
            directory: DirectoryBackupConfig::default(),
            auto_backup: AutoBackupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryBackupConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_directory_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_daily_files")]
    pub max_daily_files: usize,
    /// Cap applied to both `history` and `roundWinners`.
    #[serde(default = "default_max_entry_snapshots")]
    pub max_entry_snapshots: usize,
}

impl Default for DirectoryBackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            debounce_ms: default_directory_debounce_ms(),
            max_daily_files: default_max_daily_files(),
            max_entry_snapshots: default_max_entry_snapshots(),
        }
    }
}

impl DirectoryBackupConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn caps(&self) -> RetentionCaps {
        RetentionCaps {
            history: self.max_entry_snapshots,
            rounds: self.max_entry_snapshots,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoBackupConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_auto_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_history_snapshots")]
    pub max_history_snapshots: usize,
    #[serde(default = "default_max_round_snapshots")]
    pub max_round_snapshots: usize,
}

impl Default for AutoBackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            debounce_ms: default_auto_debounce_ms(),
            max_history_snapshots: default_max_history_snapshots(),
            max_round_snapshots: default_max_round_snapshots(),
        }
    }
}

impl AutoBackupConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn caps(&self) -> RetentionCaps {
        RetentionCaps {
            history: self.max_history_snapshots,
            rounds: self.max_round_snapshots,
        }
    }
}

impl PunchConfig {
    /// Reject settings that would make retention or debouncing meaningless.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 7] = [
            ("directory.max_daily_files", self.directory.max_daily_files == 0),
            (
                "directory.max_entry_snapshots",
                self.directory.max_entry_snapshots == 0,
            ),
            ("directory.debounce_ms", self.directory.debounce_ms == 0),
            (
                "auto_backup.max_history_snapshots",
                self.auto_backup.max_history_snapshots == 0,
            ),
            (
                "auto_backup.max_round_snapshots",
                self.auto_backup.max_round_snapshots == 0,
            ),
            ("auto_backup.debounce_ms", self.auto_backup.debounce_ms == 0),
            ("app_version", self.app_version.trim().is_empty()),
        ];
        for (field, invalid) in checks {
            if invalid {
                return Err(PunchError::Config(format!(
                    "'{field}' must not be zero or empty"
                )));
            }
        }
        Ok(())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        resolve_dir(self.data_dir.as_deref(), paths::data_dir, "data")
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        resolve_dir(self.cache_dir.as_deref(), paths::cache_dir, "cache")
    }

    pub fn export_dir(&self) -> Result<PathBuf> {
        resolve_dir(self.export_dir.as_deref(), paths::download_dir, "export")
    }

    /// Directory holding the live application state.
    pub fn state_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("state"))
    }

    /// Durable settings of the directory engine.
    pub fn directory_settings_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("directory-backup"))
    }

    /// Embedded store file of the automatic engine.
    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("auto-backup.redb"))
    }
}

fn resolve_dir(
    configured: Option<&str>,
    fallback: fn() -> Option<PathBuf>,
    what: &str,
) -> Result<PathBuf> {
    match configured {
        Some(dir) => Ok(PathBuf::from(expand_tilde(dir))),
        None => fallback()
            .ok_or_else(|| PunchError::Config(format!("cannot determine {what} directory"))),
    }
}
