//! Process-local stores.

use super::{BackendConfig, BackendConfigStore, CredentialsStore, DeviceCredentials, StorageError};
use std::sync::Mutex;

/// In-memory value slot implementing both store contracts.
#[derive(Debug)]
pub struct MemoryStore<T> {
    value: Mutex<Option<T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> MemoryStore<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `value`.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self {
            value: Mutex::new(Some(value)),
        }
    }

    fn get(&self) -> Option<T> {
        self.value.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, value: Option<T>) {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

impl BackendConfigStore for MemoryStore<BackendConfig> {
    fn load(&self) -> Result<Option<BackendConfig>, StorageError> {
        Ok(self.get().filter(BackendConfig::is_usable))
    }

    fn save(&self, config: &BackendConfig) -> Result<(), StorageError> {
        self.set(Some(config.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.set(None);
        Ok(())
    }
}

impl CredentialsStore for MemoryStore<DeviceCredentials> {
    fn load(&self) -> Result<Option<DeviceCredentials>, StorageError> {
        Ok(self.get().filter(DeviceCredentials::is_usable))
    }

    fn save(&self, credentials: &DeviceCredentials) -> Result<(), StorageError> {
        self.set(Some(credentials.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.set(None);
        Ok(())
    }
}
