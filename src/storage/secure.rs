//! Device credentials in the platform secret store.
//!
//! Uses the `keyring` crate which provides OS-appropriate secure storage:
//! - **macOS**: Keychain
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)
//! - **Windows**: Windows Credential Manager

use super::{CredentialsStore, DeviceCredentials, StorageError};

/// Service name for bridge entries in the platform credential store.
const SERVICE_NAME: &str = "pandora-bridge";

/// Account holding the JSON-encoded credentials.
const DEFAULT_ACCOUNT: &str = "device.credentials";

/// Credentials store backed by `keyring`.
#[derive(Debug, Clone)]
pub struct KeyringCredentialsStore {
    service: String,
    account: String,
}

impl KeyringCredentialsStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_owned(),
            account: DEFAULT_ACCOUNT.to_owned(),
        }
    }

    /// Use a different account name (one entry per paired profile).
    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    fn entry(&self) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| StorageError::Keyring(format!("failed to create keyring entry: {e}")))
    }
}

impl Default for KeyringCredentialsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialsStore for KeyringCredentialsStore {
    fn load(&self) -> Result<Option<DeviceCredentials>, StorageError> {
        let raw = match self.entry()?.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => {
                return Err(StorageError::Keyring(format!(
                    "failed to read credentials: {e}"
                )));
            }
        };
        let creds: DeviceCredentials = serde_json::from_str(&raw)
            .map_err(|e| StorageError::Format(format!("keyring credentials: {e}")))?;
        Ok(Some(creds).filter(DeviceCredentials::is_usable))
    }

    fn save(&self, credentials: &DeviceCredentials) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(credentials).map_err(|e| StorageError::Format(e.to_string()))?;
        self.entry()?
            .set_password(&raw)
            .map_err(|e| StorageError::Keyring(format!("failed to store credentials: {e}")))
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Keyring(format!(
                "failed to delete credentials: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_store_uses_bridge_service() {
        let store = KeyringCredentialsStore::default();
        assert_eq!(store.service, SERVICE_NAME);
        assert_eq!(store.account, DEFAULT_ACCOUNT);
    }

    #[test]
    fn with_account_overrides_account_only() {
        let store = KeyringCredentialsStore::new().with_account("profile.garage");
        assert_eq!(store.service, SERVICE_NAME);
        assert_eq!(store.account, "profile.garage");
    }
}
