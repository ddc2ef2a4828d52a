use std::path::PathBuf;

const APP_DIR: &str = "punchbuggy";

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn home_dir() -> Option<PathBuf> {
    env_path("HOME").or_else(dirs::home_dir)
}

/// Per-user data directory (`~/.local/share/punchbuggy` on Linux).
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR))
}

/// Per-user cache directory holding best-effort metadata mirrors.
pub fn cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join(APP_DIR))
}

/// Per-user config directory (`~/.config/punchbuggy` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// Where manual backups and exports are written when no destination is given.
pub fn download_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(home_dir)
}
