//! Persisted backend settings and device credentials.
//!
//! The bridge only consumes this state; the pairing flow and the settings
//! screen own it. Both values follow the same load/save/clear contract:
//!
//! - `load()` returns `Ok(None)` when nothing usable is stored
//! - `save()` replaces the stored value
//! - `clear()` is idempotent
//!
//! Backends:
//!
//! - [`MemoryStore`]: process-local, used for embedding and tests
//! - [`FileBackendConfigStore`] / [`FileCredentialsStore`]: TOML files
//! - [`KeyringCredentialsStore`]: platform secret store via `keyring`

mod file;
mod memory;
mod secure;
mod types;

pub use file::{FileBackendConfigStore, FileCredentialsStore};
pub use memory::MemoryStore;
pub use secure::KeyringCredentialsStore;
pub use types::{BackendConfig, DeviceCredentials, StorageError};

/// Load/save/clear contract for the backend connection settings.
pub trait BackendConfigStore: Send + Sync {
    /// Load the stored settings, `None` if absent or blank.
    fn load(&self) -> Result<Option<BackendConfig>, StorageError>;

    /// Persist new settings.
    fn save(&self, config: &BackendConfig) -> Result<(), StorageError>;

    /// Remove the stored settings.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Load/save/clear contract for the paired device credentials.
pub trait CredentialsStore: Send + Sync {
    /// Load the stored credentials, `None` if the device is not paired.
    fn load(&self) -> Result<Option<DeviceCredentials>, StorageError>;

    /// Persist credentials returned by a pairing call.
    fn save(&self, credentials: &DeviceCredentials) -> Result<(), StorageError>;

    /// Forget the credentials (unpair or authentication failure).
    fn clear(&self) -> Result<(), StorageError>;
}
