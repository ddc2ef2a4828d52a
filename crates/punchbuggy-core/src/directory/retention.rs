use chrono::NaiveDate;

use punchbuggy_storage::StorageBackend;
use punchbuggy_types::error::Result;

pub const LATEST_FILE: &str = "punchbuggy-latest.json";
pub const DAILY_PREFIX: &str = "punchbuggy-daily-";
const DAILY_SUFFIX: &str = ".json";

pub fn daily_file_name(date: NaiveDate) -> String {
    format!("{DAILY_PREFIX}{}{DAILY_SUFFIX}", date.format("%Y-%m-%d"))
}

pub fn parse_daily_file_name(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix(DAILY_PREFIX)?.strip_suffix(DAILY_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Daily backup file names, oldest first. Names sort by date.
pub fn daily_files(storage: &dyn StorageBackend) -> Result<Vec<String>> {
    let mut names: Vec<String> = storage
        .list(DAILY_PREFIX)?
        .into_iter()
        .filter(|name| parse_daily_file_name(name).is_some())
        .collect();
    names.sort();
    Ok(names)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<String>,
    /// File whose deletion failed; pruning stopped there.
    pub failed: Option<String>,
    pub retained: usize,
}

/// Delete the oldest daily files until at most `cap` remain.
///
/// A failed deletion is logged and ends this pass; the remaining excess is
/// left for the next backup.
pub fn prune_daily_files(storage: &dyn StorageBackend, cap: usize) -> Result<PruneReport> {
    let names = daily_files(storage)?;
    let excess = names.len().saturating_sub(cap);
    let mut report = PruneReport {
        retained: names.len(),
        ..Default::default()
    };
    for name in names.into_iter().take(excess) {
        match storage.delete(&name) {
            Ok(()) => {
                tracing::debug!(file = %name, "removed old daily backup");
                report.retained -= 1;
                report.removed.push(name);
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "failed to remove old backup");
                report.failed = Some(name);
                break;
            }
        }
    }
    Ok(report)
}
