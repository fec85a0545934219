//! Wearable status polling loop.

use super::contract::{DeviceStatus, RequestKind};
use super::correlator::{CallError, Correlator};
use super::view::{WatchEvent, WatchUiState, next_state};
use super::transport::Transport;
use crate::backend::AlarmAction;
use crate::config::CorrelatorConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Inner {
    correlator: Correlator,
    interval: Duration,
    state: watch::Sender<WatchUiState>,
}

impl Inner {
    fn apply(&self, event: WatchEvent) {
        let last_known = self.correlator.last_known_status();
        self.state
            .send_modify(|state| *state = next_state(state, event, last_known.as_ref()));
    }

    async fn refresh_once(&self, cancel: &CancellationToken) {
        self.apply(WatchEvent::RefreshStarted);
        match self
            .correlator
            .call_with_cancel(RequestKind::StatusQuery, self.correlator.call_timeout(), cancel)
            .await
        {
            Ok(status) => self.apply(WatchEvent::StatusReceived(status)),
            Err(CallError::Cancelled) => {}
            Err(e) => {
                tracing::debug!(error = %e, "status poll failed");
                self.apply(WatchEvent::RefreshFailed(e));
            }
        }
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodically refreshes the alarm status and publishes [`WatchUiState`].
pub struct StatusPoller {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

impl StatusPoller {
    pub fn new(correlator: Correlator, interval: Duration) -> Self {
        let (state, _) = watch::channel(WatchUiState::Loading);
        Self {
            inner: Arc::new(Inner {
                correlator,
                interval,
                state,
            }),
            running: Mutex::new(None),
        }
    }

    /// Poller with its own correlator, both configured from `config`.
    pub fn from_config(transport: Arc<dyn Transport>, config: &CorrelatorConfig) -> Self {
        Self::new(
            Correlator::from_config(transport, config),
            config.poll_interval(),
        )
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WatchUiState> {
        self.inner.state.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WatchUiState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Start polling. Does nothing when already running.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let interval_ms = u64::try_from(inner.interval.as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(interval_ms, "status polling started");
            loop {
                inner.refresh_once(&token).await;
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(inner.interval) => {}
                }
            }
            tracing::debug!("status polling stopped");
        });
        *running = Some(Running { cancel, handle });
    }

    /// Stop polling, releasing any in-flight call and its pending entry.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                tracing::warn!(error = %e, "status polling task failed");
            }
        }
    }

    /// Poll once outside the loop.
    pub async fn refresh(&self) {
        self.inner.refresh_once(&CancellationToken::new()).await;
    }

    /// Send `action` for the device on screen.
    ///
    /// Returns `None` without sending unless the state is `Ready` with a
    /// device id.
    pub async fn send_command(&self, action: AlarmAction) -> Option<Result<DeviceStatus, CallError>> {
        let device_id = match &*self.inner.state.borrow() {
            WatchUiState::Ready(status) => status.device_id?,
            _ => return None,
        };

        let result = self.inner.correlator.send_command(device_id, action).await;
        match &result {
            Ok(status) => self.inner.apply(WatchEvent::StatusReceived(status.clone())),
            Err(e) => {
                tracing::warn!(error = %e, device_id, action = %action, "command failed");
                self.inner.apply(WatchEvent::CommandFailed(e.clone()));
            }
        }
        Some(result)
    }
}
