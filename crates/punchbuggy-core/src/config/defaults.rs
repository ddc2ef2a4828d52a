pub(super) fn default_app_version() -> String {
    "dev".to_string()
}

pub(super) fn default_enabled() -> bool {
    true
}

pub(super) fn default_directory_debounce_ms() -> u64 {
    4_000
}

pub(super) fn default_max_daily_files() -> usize {
    14
}

pub(super) fn default_max_entry_snapshots() -> usize {
    120
}

pub(super) fn default_auto_debounce_ms() -> u64 {
    5_000
}

pub(super) fn default_max_history_snapshots() -> usize {
    200
}

pub(super) fn default_max_round_snapshots() -> usize {
    200
}
