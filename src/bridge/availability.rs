//! Three-state availability derived from persisted settings.

use super::contract::ErrorCode;
use crate::storage::{BackendConfigStore, CredentialsStore};

/// Whether the phone can serve wearable requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityState {
    /// No backend configured.
    Unavailable,
    /// Backend configured, phone not paired.
    AvailableNoDevice,
    /// Backend configured and phone paired.
    ReadyWithDevice,
}

impl AvailabilityState {
    #[must_use]
    pub fn resolve(has_config: bool, has_credentials: bool) -> Self {
        match (has_config, has_credentials) {
            (false, _) => Self::Unavailable,
            (true, false) => Self::AvailableNoDevice,
            (true, true) => Self::ReadyWithDevice,
        }
    }

    /// Read both stores and project. A store that fails to load counts as empty.
    pub fn from_stores(config: &dyn BackendConfigStore, credentials: &dyn CredentialsStore) -> Self {
        let has_config = match config.load() {
            Ok(value) => value.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load backend settings");
                false
            }
        };
        let has_credentials = match credentials.load() {
            Ok(value) => value.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load device credentials");
                false
            }
        };
        Self::resolve(has_config, has_credentials)
    }

    /// Error code reported when a request arrives in this state.
    #[must_use]
    pub fn error_code(self) -> Option<ErrorCode> {
        match self {
            Self::Unavailable => Some(ErrorCode::BackendUnavailable),
            Self::AvailableNoDevice => Some(ErrorCode::NoDevice),
            Self::ReadyWithDevice => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BackendConfig, DeviceCredentials, MemoryStore};

    #[test]
    fn projection_covers_all_inputs() {
        assert_eq!(
            AvailabilityState::resolve(false, false),
            AvailabilityState::Unavailable
        );
        assert_eq!(
            AvailabilityState::resolve(false, true),
            AvailabilityState::Unavailable
        );
        assert_eq!(
            AvailabilityState::resolve(true, false),
            AvailabilityState::AvailableNoDevice
        );
        assert_eq!(
            AvailabilityState::resolve(true, true),
            AvailabilityState::ReadyWithDevice
        );
    }

    #[test]
    fn error_codes_follow_state() {
        assert_eq!(
            AvailabilityState::Unavailable.error_code(),
            Some(ErrorCode::BackendUnavailable)
        );
        assert_eq!(
            AvailabilityState::AvailableNoDevice.error_code(),
            Some(ErrorCode::NoDevice)
        );
        assert_eq!(AvailabilityState::ReadyWithDevice.error_code(), None);
    }

    #[test]
    fn blank_stored_values_count_as_absent() {
        let config = MemoryStore::with_value(BackendConfig::new("alarm.local"));
        let creds = MemoryStore::with_value(DeviceCredentials::new("", ""));
        assert_eq!(
            AvailabilityState::from_stores(&config, &creds),
            AvailabilityState::AvailableNoDevice
        );
    }
}
