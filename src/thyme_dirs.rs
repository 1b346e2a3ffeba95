//! Filesystem locations for Thyme.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/thyme/` | `~/.config/thyme/` |
//! | Data / logs | `~/Library/Application Support/thyme/` | `~/.local/share/thyme/` |
//!
//! # Environment Overrides
//!
//! - `THYME_CONFIG_DIR` overrides [`config_dir`]
//! - `THYME_DATA_DIR` overrides [`data_dir`]

use std::path::PathBuf;

/// Application data root. Override with `THYME_DATA_DIR`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("THYME_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("thyme"))
        .unwrap_or_else(|| PathBuf::from("/tmp/thyme-data"))
}

/// Config directory. Override with `THYME_CONFIG_DIR`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("THYME_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("thyme"))
        .unwrap_or_else(|| PathBuf::from("/tmp/thyme-config"))
}

/// Main config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
