use std::fmt;
use std::path::{Path, PathBuf};

use punchbuggy_types::error::{PunchError, Result};

use super::types::PunchConfig;

const CONFIG_ENV: &str = "PUNCHBUGGY_CONFIG";

/// Tracks where the config file was found.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Explicitly passed via `--config`.
    CliArg(PathBuf),
    /// Set via the `PUNCHBUGGY_CONFIG` env var.
    EnvVar(PathBuf),
    /// Found by searching standard locations.
    SearchOrder { path: PathBuf, level: &'static str },
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::CliArg(p) => p,
            ConfigSource::EnvVar(p) => p,
            ConfigSource::SearchOrder { path, .. } => path,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CliArg(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::EnvVar(p) => write!(f, "{} ({CONFIG_ENV})", p.display()),
            ConfigSource::SearchOrder { path, level } => {
                write!(f, "{} ({})", path.display(), level)
            }
        }
    }
}

/// Standard config locations, most specific first.
pub fn default_config_search_paths() -> Vec<(PathBuf, &'static str)> {
    let mut paths = vec![(PathBuf::from("punchbuggy.yaml"), "project")];

    if let Some(dir) = punchbuggy_storage::paths::config_dir() {
        paths.push((dir.join("config.yaml"), "user"));
    }

    #[cfg(windows)]
    {
        let program_data = std::env::var_os("PROGRAMDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"));
        paths.push((program_data.join("punchbuggy").join("config.yaml"), "system"));
    }

    #[cfg(not(windows))]
    paths.push((PathBuf::from("/etc/punchbuggy/config.yaml"), "system"));

    paths
}

/// Resolve which config file to use.
///
/// Priority: CLI arg > `PUNCHBUGGY_CONFIG` env var > first existing file from
/// the search paths. Returns `None` if nothing is found.
pub fn resolve_config_path(cli_config: Option<&str>) -> Option<ConfigSource> {
    let env = std::env::var(CONFIG_ENV).ok();
    resolve_from(cli_config, env.as_deref(), &default_config_search_paths())
}

fn resolve_from(
    cli_config: Option<&str>,
    env_config: Option<&str>,
    search: &[(PathBuf, &'static str)],
) -> Option<ConfigSource> {
    if let Some(path) = cli_config {
        return Some(ConfigSource::CliArg(PathBuf::from(path)));
    }
    if let Some(val) = env_config.filter(|v| !v.is_empty()) {
        return Some(ConfigSource::EnvVar(PathBuf::from(val)));
    }
    search
        .iter()
        .find(|(path, _)| path.exists())
        .map(|(path, level)| ConfigSource::SearchOrder {
            path: path.clone(),
            level: *level,
        })
}

/// Load, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<PunchConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PunchError::Config(format!("cannot read '{}': {e}", path.display())))?;
    let config: PunchConfig = if contents.trim().is_empty() {
        PunchConfig::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|e| {
            PunchError::Config(format!("invalid config '{}': {e}", path.display()))
        })?
    };
    config.validate()?;
    Ok(config)
}

/// Resolve and load the config, falling back to defaults when no file exists.
pub fn load_or_default(cli_config: Option<&str>) -> Result<(PunchConfig, Option<ConfigSource>)> {
    match resolve_config_path(cli_config) {
        Some(source) => {
            let config = load_config(source.path())?;
            tracing::debug!(config = %source, "loaded configuration");
            Ok((config, Some(source)))
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok((PunchConfig::default(), None))
        }
    }
}

/// Returns a commented YAML config template suitable for bootstrapping.
pub fn minimal_config_template() -> &'static str {
    r#"# punchbuggy configuration file
# Every setting is optional; the values below are the defaults.

# app_version: dev
# hash: sha256            # or "fallback"

# data_dir: ~/.local/share/punchbuggy
# cache_dir: ~/.cache/punchbuggy
# export_dir: ~/Downloads

directory:
  enabled: true
  debounce_ms: 4000
  max_daily_files: 14
  max_entry_snapshots: 120

auto_backup:
  enabled: true
  debounce_ms: 5000
  max_history_snapshots: 200
  max_round_snapshots: 200
"#
}
