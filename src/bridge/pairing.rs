//! Phone pairing with the alarm backend.

use super::session::{SessionError, SessionResolver};
use crate::backend::BackendError;
use crate::storage::DeviceCredentials;
use std::sync::Arc;

/// Pairing failures.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Pairs and unpairs this phone, keeping the stored credentials and the
/// cached session consistent.
#[derive(Clone)]
pub struct Pairing {
    sessions: Arc<SessionResolver>,
}

impl Pairing {
    pub fn new(sessions: Arc<SessionResolver>) -> Self {
        Self { sessions }
    }

    /// Pair using a one-time code.
    pub async fn pair_with_code(&self, code: &str) -> Result<DeviceCredentials, PairingError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(PairingError::InvalidInput("pairing code is empty"));
        }
        let client = self.sessions.pairing_client()?;
        let credentials = client.pair_by_code(code).await?;
        self.sessions.store_credentials(&credentials)?;
        tracing::info!(device_id = %credentials.device_id, "paired with code");
        Ok(credentials)
    }

    /// Pair using account credentials.
    pub async fn pair_with_credentials(
        &self,
        email: &str,
        password: &str,
        device_name: &str,
    ) -> Result<DeviceCredentials, PairingError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PairingError::InvalidInput("email is empty"));
        }
        if password.is_empty() {
            return Err(PairingError::InvalidInput("password is empty"));
        }
        let client = self.sessions.pairing_client()?;
        let credentials = client
            .pair_by_credentials(email, password, device_name.trim())
            .await?;
        self.sessions.store_credentials(&credentials)?;
        tracing::info!(device_id = %credentials.device_id, "paired with account");
        Ok(credentials)
    }

    /// Remove the pairing. The backend call is best effort; local credentials
    /// are cleared regardless.
    pub async fn unpair(&self) -> Result<(), PairingError> {
        let Some(credentials) = self.sessions.credentials()? else {
            return Ok(());
        };
        match self.sessions.resolve() {
            Ok(session) => {
                if let Err(e) = session.client.unpair(&credentials.device_id).await {
                    tracing::warn!(error = %e, "backend unpair failed; clearing local credentials anyway");
                }
            }
            Err(e) => tracing::warn!(error = %e, "no session for backend unpair"),
        }
        self.sessions.clear_credentials()?;
        tracing::info!(device_id = %credentials.device_id, "unpaired");
        Ok(())
    }
}
