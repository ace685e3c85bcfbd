//! Persistent key/value storage.
//!
//! Values are JSON files in the platform config directory:
//!   - Linux: `~/.config/forrof-tracker/`
//!   - macOS: `~/Library/Application Support/forrof-tracker/`
//!   - Windows: `%APPDATA%\forrof-tracker\`

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

const APP_DIR: &str = "forrof-tracker";

/// Save a value to persistent storage.
///
/// Returns `true` if the operation succeeded.
pub fn save<T: Serialize>(key: &str, value: &T) -> bool {
    match config_dir() {
        Some(dir) => save_in(&dir, key, value),
        None => false,
    }
}

/// Load a value from persistent storage.
///
/// Returns `None` if the key doesn't exist or deserialization fails.
pub fn load<T: DeserializeOwned>(key: &str) -> Option<T> {
    load_in(&config_dir()?, key)
}

/// Remove a value from persistent storage.
pub fn remove(key: &str) {
    if let Some(dir) = config_dir() {
        remove_in(&dir, key);
    }
}

fn config_dir() -> Option<PathBuf> {
    let app_dir = dirs::config_dir()?.join(APP_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir).ok()?;
    }
    Some(app_dir)
}

fn file_path(dir: &Path, key: &str) -> PathBuf {
    // Sanitize key to be a valid filename
    let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
    dir.join(format!("{safe_key}.json"))
}

fn save_in<T: Serialize>(dir: &Path, key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => std::fs::write(file_path(dir, key), json).is_ok(),
        Err(e) => {
            crate::log_error!("failed to serialize {}: {}", key, e);
            false
        }
    }
}

fn load_in<T: DeserializeOwned>(dir: &Path, key: &str) -> Option<T> {
    let json = std::fs::read_to_string(file_path(dir, key)).ok()?;
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            crate::log_warn!("discarding unreadable {}: {}", key, e);
            None
        }
    }
}

fn remove_in(dir: &Path, key: &str) {
    let _ = std::fs::remove_file(file_path(dir, key));
}
