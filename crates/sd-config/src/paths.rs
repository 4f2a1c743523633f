//! OS-specific path resolution for configuration files

use sd_types::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Get the configuration directory
///
/// Priority:
/// 1. Runtime override via `SCOUTDECK_ENV` environment variable: `~/.scoutdeck-{env}/`
/// 2. Development mode (debug builds): `~/.scoutdeck-dev/`
/// 3. Production mode (release builds): `~/.scoutdeck/`
pub fn config_dir() -> AppResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("Could not determine home directory".to_string()))?;

    // Runtime override via environment variable (for testing)
    if let Ok(env_suffix) = std::env::var("SCOUTDECK_ENV") {
        return Ok(home.join(format!(".scoutdeck-{}", env_suffix)));
    }

    #[cfg(debug_assertions)]
    let dir = home.join(".scoutdeck-dev");

    #[cfg(not(debug_assertions))]
    let dir = home.join(".scoutdeck");

    Ok(dir)
}

/// Get the settings file path
pub fn settings_file() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("settings.yaml"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}
