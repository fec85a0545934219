//! Core types for persisted bridge state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend connection settings entered on the phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Host name or URL (scheme optional).
    pub host: String,
    /// Port, when not part of `host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl BackendConfig {
    /// Create settings for `host` with no explicit port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
        }
    }

    /// Attach an explicit port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Settings with a blank host are treated as absent.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

/// Credentials issued by the backend when this phone was paired.
///
/// `Debug` redacts the token so credentials never leak into logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredentials {
    /// Backend-assigned id of this phone.
    pub device_id: String,
    /// Bearer token.
    pub token: String,
}

impl DeviceCredentials {
    pub fn new(device_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            token: token.into(),
        }
    }

    /// Credentials with an empty id or token are treated as absent.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.device_id.trim().is_empty() && !self.token.trim().is_empty()
    }
}

impl fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("device_id", &self.device_id)
            .field("token", &redact(&self.token))
            .finish()
    }
}

fn redact(s: &str) -> &str {
    if s.is_empty() { "" } else { "[REDACTED]" }
}

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying file I/O failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be parsed or serialized.
    #[error("invalid stored data: {0}")]
    Format(String),

    /// Platform secret store access failed.
    #[error("keyring error: {0}")]
    Keyring(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = DeviceCredentials::new("phone-1", "super-secret");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("phone-1"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn blank_host_is_not_usable() {
        assert!(!BackendConfig::new("   ").is_usable());
        assert!(BackendConfig::new("alarm.example.com").is_usable());
    }

    #[test]
    fn empty_token_is_not_usable() {
        assert!(!DeviceCredentials::new("phone-1", "").is_usable());
        assert!(!DeviceCredentials::new("", "tok").is_usable());
        assert!(DeviceCredentials::new("phone-1", "tok").is_usable());
    }

    #[test]
    fn backend_config_without_port_omits_field() {
        let toml_str = toml::to_string(&BackendConfig::new("alarm.local")).unwrap_or_default();
        assert!(toml_str.contains("host"));
        assert!(!toml_str.contains("port"));
    }
}
