//! Cross-Platform Path Utilities
//!
//! Resolves the application directory (`~/.qwen-chat/`) and its files.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the application directory (~/.qwen-chat/)
pub fn app_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".qwen-chat"))
}

/// Get the config file path (~/.qwen-chat/config.toml)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("config.toml"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
