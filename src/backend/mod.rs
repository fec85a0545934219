//! Alarm backend collaborator.
//!
//! The responder talks to the backend only through [`BackendApi`]; clients are
//! built per base URL by a [`BackendFactory`] so the session resolver can
//! rebuild them when the stored settings change.

pub mod error;
mod http;
mod types;
pub mod urls;

pub use error::BackendError;
pub use http::{HttpBackendClient, HttpBackendFactory};
pub use types::{AlarmAction, AlarmDevice, AlarmDeviceData};

use crate::storage::{BackendConfig, DeviceCredentials};
use async_trait::async_trait;
use std::sync::Arc;

/// Operations the bridge needs from the alarm backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Pair this phone using a one-time code shown by the backend.
    async fn pair_by_code(&self, code: &str) -> Result<DeviceCredentials, BackendError>;

    /// Pair this phone with account credentials.
    async fn pair_by_credentials(
        &self,
        email: &str,
        password: &str,
        device_name: &str,
    ) -> Result<DeviceCredentials, BackendError>;

    /// List alarm devices visible to the paired phone.
    async fn list_devices(&self) -> Result<Vec<AlarmDevice>, BackendError>;

    /// Submit a remote command for one alarm device.
    async fn send_command(&self, device_id: i64, action: AlarmAction) -> Result<(), BackendError>;

    /// Remove the pairing for `device_id` on the backend.
    async fn unpair(&self, device_id: &str) -> Result<(), BackendError>;
}

/// Constructs backend clients for a given connection setting.
pub trait BackendFactory: Send + Sync {
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendApi>, BackendError>;
}

/// Session-level notifications raised by backend clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend answered 401; stored credentials were cleared.
    Unauthorized,
}
