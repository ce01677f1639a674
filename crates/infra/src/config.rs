//! Configuration loading
//!
//! Loads the calendar sync configuration from a TOML file.
//!
//! ## Loading Strategy
//! 1. `HOMEBOARD_CONFIG` environment variable, when set, names the file
//! 2. Otherwise probes `./homeboard.toml` then `./config.toml`

use std::path::{Path, PathBuf};

use homeboard_domain::{CalendarSyncConfig, HomeboardError, Result};
use tracing::info;

const PROBE_PATHS: &[&str] = &["homeboard.toml", "config.toml"];

/// Load configuration with automatic path discovery.
///
/// # Errors
/// Returns `HomeboardError::Config` when no config file can be found, read,
/// or parsed.
pub fn load() -> Result<CalendarSyncConfig> {
    if let Ok(path) = std::env::var("HOMEBOARD_CONFIG") {
        return load_from_file(Path::new(&path));
    }

    let path = probe_config_paths()
        .ok_or_else(|| HomeboardError::Config("no configuration file found".to_string()))?;
    load_from_file(&path)
}

/// Load configuration from a specific TOML file.
///
/// # Errors
/// Returns `HomeboardError::Config` when the file cannot be read or parsed.
pub fn load_from_file(path: &Path) -> Result<CalendarSyncConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        HomeboardError::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: CalendarSyncConfig = toml::from_str(&raw).map_err(|e| {
        HomeboardError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;

    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// First probe path that exists, if any.
#[must_use]
pub fn probe_config_paths() -> Option<PathBuf> {
    PROBE_PATHS.iter().copied().map(PathBuf::from).find(|p| p.exists())
}
