//! Wearable-side request correlation.
//!
//! Every call gets a fresh UUID, a pending entry and a oneshot slot. The
//! inbound handler and the timeout race to remove the entry; whoever removes it
//! first decides the outcome and the other observes absence and does nothing.

use super::contract::{self, DeviceStatus, ErrorCode, Inbound, RequestEnvelope, RequestKind, ResponseEnvelope};
use super::peer::PeerDirectory;
use super::transport::{MessageHandler, RawMessage, Transport};
use crate::backend::AlarmAction;
use crate::config::CorrelatorConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Why a call produced no status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// No response arrived before the deadline.
    #[error("no response from phone within the call timeout")]
    Timeout,

    /// The phone has no backend configured or could not reach it.
    #[error("alarm backend unavailable")]
    BackendUnavailable,

    /// The phone is not paired with the backend.
    #[error("no paired device")]
    NoDevice,

    /// The phone reported it is not ready.
    #[error("phone not ready")]
    NotReady,

    /// The backend rejected the operation or it failed on the phone.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// The request could not be encoded, or the phone could not parse it.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request could not be handed to the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller cancelled the wait.
    #[error("call cancelled")]
    Cancelled,

    /// The pending slot was dropped without a response.
    #[error("correlator shut down")]
    Disconnected,
}

impl CallError {
    /// Stable code for this error; carried codes keep their wire names.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::BackendUnavailable => ErrorCode::BackendUnavailable.as_str(),
            Self::NoDevice => ErrorCode::NoDevice.as_str(),
            Self::NotReady => ErrorCode::NotReady.as_str(),
            Self::CommandFailed(_) => ErrorCode::CommandFailed.as_str(),
            Self::Protocol(_) => ErrorCode::IncompatibleProtocol.as_str(),
            Self::Transport(_) => "TRANSPORT",
            Self::Cancelled => "CANCELLED",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    /// Map the error code carried by a failed response.
    fn from_response(code: Option<&str>) -> Self {
        match code.and_then(ErrorCode::parse) {
            Some(ErrorCode::BackendUnavailable) => Self::BackendUnavailable,
            Some(ErrorCode::NoDevice) => Self::NoDevice,
            Some(ErrorCode::NotReady) => Self::NotReady,
            Some(ErrorCode::IncompatibleProtocol) => {
                Self::Protocol("phone could not parse the request".to_owned())
            }
            Some(ErrorCode::CommandFailed) | None => {
                Self::CommandFailed(code.unwrap_or("no status in response").to_owned())
            }
        }
    }
}

struct PendingCall {
    slot: oneshot::Sender<ResponseEnvelope>,
    created_at: Instant,
}

struct Inner {
    transport: Arc<dyn Transport>,
    peers: PeerDirectory,
    pending: Mutex<HashMap<String, PendingCall>>,
    last_known: watch::Sender<Option<DeviceStatus>>,
    call_timeout: Duration,
}

impl Inner {
    fn insert(&self, id: String, call: PendingCall) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, call);
    }

    fn remove(&self, id: &str) -> Option<PendingCall> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    fn handle_inbound(&self, message: RawMessage) {
        let response = match contract::decode(&message.path, &message.payload) {
            Ok(Inbound::Response(response)) => response,
            Ok(Inbound::Request(_)) => {
                tracing::debug!(path = %message.path, "ignoring request on the wearable side");
                return;
            }
            Err(e) => {
                tracing::debug!(error = %e, source = %message.source, "dropping unparseable response");
                return;
            }
        };

        let Some(id) = response.correlation_id.clone() else {
            tracing::debug!("dropping response without request id");
            return;
        };

        match self.remove(&id) {
            Some(call) => {
                tracing::debug!(
                    request_id = %id,
                    elapsed_ms = u64::try_from(call.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "response matched pending call"
                );
                // The caller may have gone away after the entry was removed.
                let _ = call.slot.send(response);
            }
            None => tracing::debug!(request_id = %id, "no pending call for response; dropping"),
        }
    }
}

/// Removes the pending entry when the call future is dropped or returns.
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.remove(self.id);
    }
}

/// Transport handler holding the correlator weakly.
struct InboundAdapter(Weak<Inner>);

impl MessageHandler for InboundAdapter {
    fn on_message(&self, message: RawMessage) {
        if let Some(inner) = self.0.upgrade() {
            inner.handle_inbound(message);
        }
    }
}

enum Outcome {
    Received(Result<ResponseEnvelope, oneshot::error::RecvError>),
    Cancelled,
    Elapsed,
}

/// Issues calls to the phone and matches their responses.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<Inner>,
}

impl Correlator {
    /// Create a correlator and register it as the transport's inbound handler.
    pub fn new(transport: Arc<dyn Transport>, peers: PeerDirectory, call_timeout: Duration) -> Self {
        let (last_known, _) = watch::channel(None);
        let inner = Arc::new(Inner {
            transport,
            peers,
            pending: Mutex::new(HashMap::new()),
            last_known,
            call_timeout,
        });
        inner
            .transport
            .set_handler(Arc::new(InboundAdapter(Arc::downgrade(&inner))));
        Self { inner }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &CorrelatorConfig) -> Self {
        Self::new(
            transport,
            PeerDirectory::from_config(config.peer.as_deref()),
            config.call_timeout(),
        )
    }

    /// Issue `kind` and wait up to `timeout` for its response.
    pub async fn call(&self, kind: RequestKind, timeout: Duration) -> Result<DeviceStatus, CallError> {
        self.call_with_cancel(kind, timeout, &CancellationToken::new())
            .await
    }

    /// Like [`Self::call`], also returning `Cancelled` as soon as `cancel` fires.
    ///
    /// The deadline and `cancel` cover peer resolution and the send as well as
    /// the wait, so a blocked transport cannot hold the call past `timeout`.
    pub async fn call_with_cancel(
        &self,
        kind: RequestKind,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DeviceStatus, CallError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let id = uuid::Uuid::new_v4().to_string();
        let request = RequestEnvelope {
            correlation_id: id.clone(),
            kind,
        };
        let payload = request
            .encode()
            .map_err(|e| CallError::Protocol(e.to_string()))?;

        let (tx, mut rx) = oneshot::channel();
        self.inner.insert(
            id.clone(),
            PendingCall {
                slot: tx,
                created_at: Instant::now(),
            },
        );
        let _guard = PendingGuard {
            inner: &self.inner,
            id: &id,
        };

        let exchange = async {
            let transport = self.inner.transport.as_ref();
            let peer = self
                .inner
                .peers
                .resolve(transport)
                .await
                .map_err(|e| CallError::Transport(e.to_string()))?;
            if let Err(e) = transport
                .send(&peer, request.path().as_str(), payload)
                .await
            {
                tracing::warn!(error = %e, peer = %peer, request_id = %id, "failed to send request");
                self.inner.peers.forget();
                return Err(CallError::Transport(e.to_string()));
            }
            tracing::debug!(request_id = %id, path = request.path().as_str(), "request sent");
            Ok::<_, CallError>((&mut rx).await)
        };

        let outcome = tokio::select! {
            result = tokio::time::timeout_at(deadline, exchange) => match result {
                Ok(Ok(received)) => Outcome::Received(received),
                Ok(Err(e)) => return Err(e),
                Err(_) => Outcome::Elapsed,
            },
            () = cancel.cancelled() => Outcome::Cancelled,
        };

        let received = match outcome {
            Outcome::Received(received) => received,
            Outcome::Cancelled => {
                tracing::debug!(request_id = %id, "call cancelled");
                return Err(CallError::Cancelled);
            }
            Outcome::Elapsed => {
                if self.inner.remove(&id).is_some() {
                    tracing::debug!(request_id = %id, "call timed out");
                    return Err(CallError::Timeout);
                }
                // The handler removed the entry first; its response is in the slot.
                rx.await
            }
        };

        let response = received.map_err(|_| CallError::Disconnected)?;
        self.settle(response)
    }

    /// Query the phone for the current alarm status.
    pub async fn request_status(&self) -> Result<DeviceStatus, CallError> {
        self.call(RequestKind::StatusQuery, self.inner.call_timeout)
            .await
    }

    /// Ask the phone to run `action` on `device_id`; returns the refreshed status.
    pub async fn send_command(
        &self,
        device_id: i64,
        action: AlarmAction,
    ) -> Result<DeviceStatus, CallError> {
        let kind = RequestKind::Command {
            target_device_id: device_id,
            action: action.as_str().to_owned(),
        };
        self.call(kind, self.inner.call_timeout).await
    }

    /// Feed an inbound payload directly (transports call this via the handler).
    pub fn handle_inbound(&self, message: RawMessage) {
        self.inner.handle_inbound(message);
    }

    /// The most recent successful status, kept across failed calls.
    #[must_use]
    pub fn last_known_status(&self) -> Option<DeviceStatus> {
        self.inner.last_known.borrow().clone()
    }

    /// Number of calls awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.inner.call_timeout
    }

    /// Unregister from the transport; later responses are dropped there.
    pub fn detach(&self) {
        self.inner.transport.clear_handler();
    }

    fn settle(&self, response: ResponseEnvelope) -> Result<DeviceStatus, CallError> {
        if response.success && response.error.is_none() {
            if let Some(status) = response.status {
                self.inner.last_known.send_replace(Some(status.clone()));
                return Ok(status);
            }
        }
        Err(CallError::from_response(response.error_code()))
    }
}
