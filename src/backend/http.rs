//! `reqwest` client for the alarm backend REST API.

use super::error::BackendError;
use super::types::{
    AlarmAction, AlarmCommandRequest, AlarmDevice, CredentialPairRequest, PairResponse,
};
use super::{BackendApi, BackendFactory, SessionEvent, urls};
use crate::config::BackendClientConfig;
use crate::storage::{BackendConfig, CredentialsStore, DeviceCredentials};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Requests under this prefix are sent without auth headers.
const PAIRING_PREFIX: &str = "api/devices/pairing";

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 16;

/// Maximum number of body characters kept in error messages.
const MAX_ERROR_BODY: usize = 500;

/// HTTP implementation of [`BackendApi`].
///
/// Auth headers are read from the credentials store on every request, so a
/// client keeps working across re-pairing until the base URL changes.
pub struct HttpBackendClient {
    base_url: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialsStore>,
    events: broadcast::Sender<SessionEvent>,
    log_bodies: bool,
}

impl HttpBackendClient {
    /// Build a client for `base_url` (normalised, ending in `/`).
    pub fn new(
        base_url: impl Into<String>,
        config: &BackendClientConfig,
        credentials: Arc<dyn CredentialsStore>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self, BackendError> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        reqwest::Url::parse(&base_url)
            .map_err(|e| BackendError::Config(format!("invalid base URL {base_url}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            client,
            credentials,
            events,
            log_bodies: config.log_bodies,
        })
    }

    /// The normalised base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check `GET /api/ready`; ready iff 2xx with body `{"status":"ok"}`.
    pub async fn check_ready(&self) -> bool {
        let url = self.url("api/ready");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<serde_json::Value>().await {
                    Ok(body) => body.get("status").and_then(|s| s.as_str()) == Some("ok"),
                    Err(e) => {
                        tracing::debug!(error = %e, "ready check returned a non-JSON body");
                        false
                    }
                }
            }
            Ok(resp) => {
                tracing::debug!(status = resp.status().as_u16(), "ready check rejected");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "ready check failed");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach `Authorization` and `Cookie` headers unless `path` is a pairing
    /// call. Returns the credentials that were attached.
    fn authorize(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> (RequestBuilder, Option<DeviceCredentials>) {
        if path.trim_start_matches('/').starts_with(PAIRING_PREFIX) {
            return (request, None);
        }
        match self.credentials.load() {
            Ok(Some(creds)) => {
                let request = request
                    .bearer_auth(&creds.token)
                    .header(reqwest::header::COOKIE, format!("device_id={}", creds.device_id));
                (request, Some(creds))
            }
            Ok(None) => (request, None),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load credentials for backend request");
                (request, None)
            }
        }
    }

    /// Send an authorized request and map non-success statuses.
    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<Response, BackendError> {
        let (request, sent) = self.authorize(request, path);
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(sent.as_ref());
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_owned()
            } else {
                body.chars().take(MAX_ERROR_BODY).collect()
            };
            tracing::warn!(path, status = status.as_u16(), "backend request failed");
            return Err(BackendError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, BackendError> {
        let response = self.execute(request, path).await?;
        let body = response.text().await?;
        if self.log_bodies && !path.starts_with(PAIRING_PREFIX) {
            tracing::debug!(path, body = %body, "backend response");
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(format!("{path}: {e}")))
    }

    /// Clear the stored credentials after a 401, unless they were replaced
    /// since the rejected request was sent.
    fn handle_unauthorized(&self, sent: Option<&DeviceCredentials>) {
        match self.credentials.load() {
            Ok(Some(current)) if sent.is_some_and(|sent| *sent != current) => {
                tracing::info!("401 for superseded credentials; keeping the current ones");
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to reload credentials after 401"),
        }
        tracing::warn!("backend rejected credentials; clearing stored credentials");
        if let Err(e) = self.credentials.clear() {
            tracing::error!(error = %e, "failed to clear credentials after 401");
        }
        // No subscribers is fine.
        let _ = self.events.send(SessionEvent::Unauthorized);
    }
}

#[async_trait]
impl BackendApi for HttpBackendClient {
    async fn pair_by_code(&self, code: &str) -> Result<DeviceCredentials, BackendError> {
        let path = format!("{PAIRING_PREFIX}/code/{}", code.trim());
        let request = self.client.post(self.url(&path));
        let pair: PairResponse = self.execute_json(request, &path).await?;
        Ok(DeviceCredentials::new(pair.device_id, pair.token))
    }

    async fn pair_by_credentials(
        &self,
        email: &str,
        password: &str,
        device_name: &str,
    ) -> Result<DeviceCredentials, BackendError> {
        let path = format!("{PAIRING_PREFIX}/cred");
        let request = self.client.post(self.url(&path)).json(&CredentialPairRequest {
            email,
            password,
            device_name,
        });
        let pair: PairResponse = self.execute_json(request, &path).await?;
        Ok(DeviceCredentials::new(pair.device_id, pair.token))
    }

    async fn list_devices(&self) -> Result<Vec<AlarmDevice>, BackendError> {
        let path = "api/alarm/devices";
        self.execute_json(self.client.get(self.url(path)), path).await
    }

    async fn send_command(&self, device_id: i64, action: AlarmAction) -> Result<(), BackendError> {
        let path = "api/alarm/command";
        let request = self.client.post(self.url(path)).json(&AlarmCommandRequest {
            alarm_device_id: device_id,
            action,
        });
        self.execute(request, path).await?;
        tracing::info!(device_id, action = %action, "alarm command accepted");
        Ok(())
    }

    async fn unpair(&self, device_id: &str) -> Result<(), BackendError> {
        let path = format!("api/devices/{device_id}");
        self.execute(self.client.delete(self.url(&path)), &path)
            .await?;
        Ok(())
    }
}

/// Builds [`HttpBackendClient`]s that share one credentials store and one
/// session event channel.
#[derive(Clone)]
pub struct HttpBackendFactory {
    config: BackendClientConfig,
    credentials: Arc<dyn CredentialsStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl HttpBackendFactory {
    pub fn new(config: BackendClientConfig, credentials: Arc<dyn CredentialsStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            credentials,
            events,
        }
    }

    /// Subscribe to session events raised by any client this factory built.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Build a concrete client (used by the binary for the readiness check).
    pub fn build_http(&self, config: &BackendConfig) -> Result<HttpBackendClient, BackendError> {
        HttpBackendClient::new(
            urls::base_url(config),
            &self.config,
            Arc::clone(&self.credentials),
            self.events.clone(),
        )
    }
}

impl BackendFactory for HttpBackendFactory {
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendApi>, BackendError> {
        Ok(Arc::new(self.build_http(config)?))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::storage::MemoryStore;

    fn client_for(base: &str) -> HttpBackendClient {
        let creds: Arc<dyn CredentialsStore> = Arc::new(MemoryStore::<DeviceCredentials>::new());
        let (events, _) = broadcast::channel(4);
        HttpBackendClient::new(base, &BackendClientConfig::default(), creds, events)
            .expect("client")
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = client_for("http://alarm.local:8080");
        assert_eq!(client.base_url(), "http://alarm.local:8080/");
        assert_eq!(client.url("/api/ready"), "http://alarm.local:8080/api/ready");
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let creds: Arc<dyn CredentialsStore> = Arc::new(MemoryStore::<DeviceCredentials>::new());
        let (events, _) = broadcast::channel(4);
        let result = HttpBackendClient::new(
            "not a url",
            &BackendClientConfig::default(),
            creds,
            events,
        );
        assert!(matches!(result, Err(BackendError::Config(_))));
    }

    #[tokio::test]
    async fn unreachable_backend_is_not_ready() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = client_for("http://127.0.0.1:9/");
        assert!(!client.check_ready().await);
    }
}
