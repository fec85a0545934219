//! Filesystem locations used by the bridge.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/pandora-bridge/` | `~/.local/share/pandora-bridge/` |
//! | Config | `~/Library/Application Support/pandora-bridge/` | `~/.config/pandora-bridge/` |
//!
//! # Environment Overrides
//!
//! - `PANDORA_BRIDGE_DATA_DIR` overrides [`data_dir`]
//! - `PANDORA_BRIDGE_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "pandora-bridge";

/// Application data root directory.
///
/// Holds the persisted backend connection settings and device credentials.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PANDORA_BRIDGE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/pandora-bridge-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("PANDORA_BRIDGE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/pandora-bridge-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Backend host/port file (`data_dir()/backend.toml`).
#[must_use]
pub fn backend_file() -> PathBuf {
    data_dir().join("backend.toml")
}

/// Device credentials file (`data_dir()/credentials.toml`).
#[must_use]
pub fn credentials_file() -> PathBuf {
    data_dir().join("credentials.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        assert!(!data_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_file_ends_with_config_toml() {
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn store_files_live_under_data_dir() {
        let data = data_dir();
        for file in [backend_file(), credentials_file()] {
            assert!(
                file.starts_with(&data),
                "{} should start with data_dir ({})",
                file.display(),
                data.display()
            );
        }
    }
}
