//! Configuration management for Scoutdeck
//!
//! Loads and saves the YAML settings file from the OS-specific config
//! directory. A missing file is not an error: first run gets defaults.

use sd_types::{AppError, AppResult};
use std::path::Path;
use tracing::debug;

pub mod paths;
pub mod types;

pub use types::DashboardConfig;

/// Load configuration from the default location
pub fn load() -> AppResult<DashboardConfig> {
    let path = paths::settings_file()?;
    load_from_path(&path)
}

/// Load configuration from a specific path
pub fn load_from_path(path: &Path) -> AppResult<DashboardConfig> {
    if !path.exists() {
        debug!("No settings file at {}, using defaults", path.display());
        return Ok(DashboardConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    serde_yaml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Save configuration to the default location
pub fn save(config: &DashboardConfig) -> AppResult<()> {
    let path = paths::settings_file()?;
    save_to_path(config, &path)
}

/// Save configuration to a specific path
pub fn save_to_path(config: &DashboardConfig, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir_exists(parent)?;
    }

    let raw = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize settings: {}", e)))?;

    std::fs::write(path, raw)
        .map_err(|e| AppError::Config(format!("Failed to write {}: {}", path.display(), e)))?;

    debug!("Saved settings to {}", path.display());
    Ok(())
}
