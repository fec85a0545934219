//! Phone-side backend session cache.

use super::availability::AvailabilityState;
use crate::backend::{BackendApi, BackendError, BackendFactory, SessionEvent, urls};
use crate::storage::{BackendConfigStore, CredentialsStore, DeviceCredentials, StorageError};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A backend client bound to the settings it was built from.
pub struct BackendSession {
    pub client: Arc<dyn BackendApi>,
    pub base_url: String,
    pub credentials: DeviceCredentials,
}

impl std::fmt::Debug for BackendSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSession")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Why no session could be produced.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no backend configured")]
    NotConfigured,

    #[error("phone is not paired")]
    NotPaired,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Lazily builds and caches one [`BackendSession`].
///
/// Concurrent callers share the cached session. It is rebuilt when the stored
/// base URL or credentials no longer match, or after [`Self::invalidate`].
/// Callers holding an older `Arc<BackendSession>` keep using it until they
/// finish.
pub struct SessionResolver {
    config_store: Arc<dyn BackendConfigStore>,
    credentials_store: Arc<dyn CredentialsStore>,
    factory: Arc<dyn BackendFactory>,
    cached: Mutex<Option<Arc<BackendSession>>>,
}

impl SessionResolver {
    pub fn new(
        config_store: Arc<dyn BackendConfigStore>,
        credentials_store: Arc<dyn CredentialsStore>,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            config_store,
            credentials_store,
            factory,
            cached: Mutex::new(None),
        }
    }

    /// Current availability derived from the stores.
    #[must_use]
    pub fn availability(&self) -> AvailabilityState {
        AvailabilityState::from_stores(self.config_store.as_ref(), self.credentials_store.as_ref())
    }

    /// Return the cached session, building it if absent or stale.
    pub fn resolve(&self) -> Result<Arc<BackendSession>, SessionError> {
        let config = self.config_store.load()?.ok_or(SessionError::NotConfigured)?;
        let credentials = self
            .credentials_store
            .load()?
            .ok_or(SessionError::NotPaired)?;
        let base_url = urls::base_url(&config);

        // Build under the lock so racing callers converge on one instance.
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = cached.as_ref()
            && session.base_url == base_url
            && session.credentials == credentials
        {
            return Ok(Arc::clone(session));
        }

        let client = self.factory.create(&config)?;
        let session = Arc::new(BackendSession {
            client,
            base_url,
            credentials,
        });
        tracing::info!(base_url = %session.base_url, "backend session created");
        *cached = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Client for pairing calls, which need settings but no credentials.
    pub fn pairing_client(&self) -> Result<Arc<dyn BackendApi>, SessionError> {
        let config = self.config_store.load()?.ok_or(SessionError::NotConfigured)?;
        Ok(self.factory.create(&config)?)
    }

    /// Drop the cached session; the next call rebuilds it.
    pub fn invalidate(&self) {
        let previous = self
            .cached
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if previous.is_some() {
            tracing::info!("backend session invalidated");
        }
    }

    /// Drop the cached session only if it is `session`.
    ///
    /// A failure seen on an older session must not discard one rebuilt after
    /// re-pairing.
    pub fn invalidate_if_current(&self, session: &Arc<BackendSession>) {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if cached
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            *cached = None;
            tracing::info!("backend session invalidated");
        } else {
            tracing::debug!("stale session failed; keeping the current one");
        }
    }

    /// Whether a session is currently cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cached
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Persist credentials from a pairing call and drop the stale session.
    pub fn store_credentials(&self, credentials: &DeviceCredentials) -> Result<(), SessionError> {
        self.credentials_store.save(credentials)?;
        self.invalidate();
        Ok(())
    }

    /// Forget credentials and drop the session.
    pub fn clear_credentials(&self) -> Result<(), SessionError> {
        self.credentials_store.clear()?;
        self.invalidate();
        Ok(())
    }

    /// Stored credentials, if paired.
    pub fn credentials(&self) -> Result<Option<DeviceCredentials>, SessionError> {
        Ok(self.credentials_store.load()?)
    }

    /// Invalidate on every `Unauthorized` event until `shutdown` fires.
    pub fn spawn_invalidation(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<SessionEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = shutdown.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(SessionEvent::Unauthorized) => resolver.invalidate(),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "session events lagged; invalidating");
                        resolver.invalidate();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
