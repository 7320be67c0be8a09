use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Config;

/// Get the canonical config file path (~/.pitchkit/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    Ok(state_dir()?.join("config.json"))
}

/// Get the state directory (~/.pitchkit)
fn state_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".pitchkit"))
}

/// Directory for file-backed pitch rows: `config.data_dir` or ~/.pitchkit/data
pub fn data_dir(config: &Config) -> Result<PathBuf, String> {
    match &config.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(state_dir()?.join("data")),
    }
}

/// Load configuration from ~/.pitchkit/config.json
///
/// A missing file is not an error: every field has a default.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::debug!("Config: {} not found, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Write config.json, creating ~/.pitchkit/ if needed.
pub fn save_config(config: &Config) -> Result<(), String> {
    save_config_to(&config_path()?, config)
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}
