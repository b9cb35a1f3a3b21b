//! Configuration and log file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/scenario-player/` and `~/.local/share/scenario-player/`
//! - macOS: `~/Library/Application Support/scenario-player/`
//! - Windows: `%APPDATA%\scenario-player\`

use std::io;
use std::path::{Path, PathBuf};

/// Application name used for directories and log files
const APP_NAME: &str = "scenario-player";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}

/// Ensure the log directory exists
pub fn ensure_log_dir() -> io::Result<Option<PathBuf>> {
    if let Some(dir) = log_dir() {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Some(dir))
    } else {
        Ok(None)
    }
}

/// Log file name for one run of a scenario file
///
/// `scenario-player_<scenario file name>_<local timestamp>.log`
pub fn run_log_file_name(scenario: &Path) -> String {
    let base = scenario
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scenario".to_string());
    format!(
        "{}_{}_{}.log",
        APP_NAME,
        base,
        chrono::Local::now().format("%Y-%m-%dT%H-%M-%S")
    )
}
