//! TOML file-backed stores.

use super::{BackendConfig, BackendConfigStore, CredentialsStore, DeviceCredentials, StorageError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Backend host/port persisted as a small TOML file.
#[derive(Debug, Clone)]
pub struct FileBackendConfigStore {
    path: PathBuf,
}

impl FileBackendConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BackendConfigStore for FileBackendConfigStore {
    fn load(&self) -> Result<Option<BackendConfig>, StorageError> {
        Ok(read_toml::<BackendConfig>(&self.path)?.filter(BackendConfig::is_usable))
    }

    fn save(&self, config: &BackendConfig) -> Result<(), StorageError> {
        write_toml(&self.path, config, false)
    }

    fn clear(&self) -> Result<(), StorageError> {
        remove_if_exists(&self.path)
    }
}

/// Device credentials persisted as a TOML file readable only by the owner.
#[derive(Debug, Clone)]
pub struct FileCredentialsStore {
    path: PathBuf,
}

impl FileCredentialsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialsStore for FileCredentialsStore {
    fn load(&self) -> Result<Option<DeviceCredentials>, StorageError> {
        Ok(read_toml::<DeviceCredentials>(&self.path)?.filter(DeviceCredentials::is_usable))
    }

    fn save(&self, credentials: &DeviceCredentials) -> Result<(), StorageError> {
        write_toml(&self.path, credentials, true)
    }

    fn clear(&self) -> Result<(), StorageError> {
        remove_if_exists(&self.path)
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::Format(format!("{}: {e}", path.display())))
}

fn write_toml<T: Serialize>(path: &Path, value: &T, private: bool) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(value).map_err(|e| StorageError::Format(e.to_string()))?;
    std::fs::write(path, content)?;

    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
