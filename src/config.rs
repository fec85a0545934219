//! Configuration types for the bridge.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Wearable-side request/response settings.
    pub correlator: CorrelatorConfig,
    /// Alarm backend HTTP client settings.
    pub backend: BackendClientConfig,
    /// Where backend settings and device credentials are persisted.
    pub storage: StorageConfig,
}

/// Wearable-side call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// How long a call waits for its response before failing with a timeout.
    pub call_timeout_ms: u64,
    /// Delay between status polls while the poller is running.
    pub poll_interval_ms: u64,
    /// Fixed peer node id. When `None`, the first connected node is used.
    pub peer: Option<String>,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 5_000,
            poll_interval_ms: 10_000,
            peer: None,
        }
    }
}

impl CorrelatorConfig {
    /// Call timeout as a [`Duration`].
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Alarm backend HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendClientConfig {
    /// Per-request timeout for backend calls.
    pub request_timeout_ms: u64,
    /// Log response bodies at debug level. Never enabled for pairing responses.
    pub log_bodies: bool,
}

impl Default for BackendClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            log_bodies: false,
        }
    }
}

impl BackendClientConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Persistence locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// TOML file holding the backend host/port.
    pub backend_file: PathBuf,
    /// TOML file holding the device credentials (ignored when `use_keyring`).
    pub credentials_file: PathBuf,
    /// Keep device credentials in the platform secret store instead of a file.
    pub use_keyring: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend_file: crate::paths::backend_file(),
            credentials_file: crate::paths::credentials_file(),
            use_keyring: false,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::BridgeError::Config(e.to_string()))
    }

    /// Load the config at `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BridgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }
}
