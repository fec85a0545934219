//! Phone-side request handling.
//!
//! Each inbound request runs on its own task:
//!
//! ```text
//! Received -> StateResolved -> SessionReady | SessionUnavailable
//!          -> Executed | ExecutionFailed -> ResponseSent
//! ```
//!
//! Every parseable request gets exactly one response. The only exit without a
//! response is shutdown; the wearable then times out.

use super::contract::{
    self, DeviceStatus, ErrorCode, Inbound, MessagePath, RequestEnvelope, RequestKind,
    ResponseEnvelope,
};
use super::session::{BackendSession, SessionError, SessionResolver};
use super::transport::{MessageHandler, RawMessage, Transport};
use crate::backend::{AlarmAction, AlarmDevice, BackendError};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

struct Inner {
    transport: Arc<dyn Transport>,
    sessions: Arc<SessionResolver>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

/// Transport handler holding the responder weakly.
struct RequestAdapter(Weak<Inner>);

impl MessageHandler for RequestAdapter {
    fn on_message(&self, message: RawMessage) {
        let Some(inner) = self.0.upgrade() else {
            return;
        };
        if inner.shutdown.is_cancelled() {
            tracing::debug!(path = %message.path, "responder shut down; dropping request");
            return;
        }
        let task_inner = Arc::clone(&inner);
        inner.tasks.spawn(async move {
            task_inner.handle(message).await;
        });
    }
}

/// Serves wearable requests against the alarm backend.
pub struct CommandResponder {
    inner: Arc<Inner>,
}

impl CommandResponder {
    /// Create a responder and register it as the transport's inbound handler.
    pub fn attach(transport: Arc<dyn Transport>, sessions: Arc<SessionResolver>) -> Self {
        Self::attach_with_shutdown(transport, sessions, CancellationToken::new())
    }

    /// Like [`Self::attach`], stopping when `shutdown` is cancelled.
    pub fn attach_with_shutdown(
        transport: Arc<dyn Transport>,
        sessions: Arc<SessionResolver>,
        shutdown: CancellationToken,
    ) -> Self {
        let inner = Arc::new(Inner {
            transport,
            sessions,
            shutdown,
            tasks: TaskTracker::new(),
        });
        inner
            .transport
            .set_handler(Arc::new(RequestAdapter(Arc::downgrade(&inner))));
        Self { inner }
    }

    /// Handle one raw message to completion (the handler does this on a task).
    pub async fn handle(&self, message: RawMessage) {
        self.inner.handle(message).await;
    }

    /// Number of requests currently being handled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Stop accepting requests and wait for in-flight ones to be answered.
    pub async fn drain(&self) {
        self.inner.transport.clear_handler();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        tracing::info!("command responder drained");
    }

    /// Stop accepting requests, abandon in-flight work without responding,
    /// and wait for the request tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.transport.clear_handler();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        tracing::info!("command responder stopped");
    }
}

impl Inner {
    async fn handle(&self, message: RawMessage) {
        let Some(path) = MessagePath::parse(&message.path) else {
            tracing::debug!(path = %message.path, "ignoring message on unknown path");
            return;
        };
        if !path.is_request() {
            tracing::debug!(path = %message.path, "ignoring response on the phone side");
            return;
        }

        let response = match contract::decode(&message.path, &message.payload) {
            Ok(Inbound::Request(request)) => {
                let request_id = request.correlation_id.clone();
                tracing::debug!(request_id = %request_id, path = path.as_str(), "request received");
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => {
                        tracing::debug!(request_id = %request_id, "shutdown during request; not responding");
                        return;
                    }
                    response = self.process(request) => response,
                }
            }
            Ok(Inbound::Response(_)) => return,
            Err(e) => {
                tracing::warn!(error = %e, source = %message.source, "unparseable request");
                ResponseEnvelope::failure(None, ErrorCode::IncompatibleProtocol)
            }
        };

        if self.shutdown.is_cancelled() {
            return;
        }
        self.respond(&message.source, path.response_path(), &response)
            .await;
    }

    async fn respond(&self, peer: &str, path: MessagePath, response: &ResponseEnvelope) {
        let payload = match response.encode(path) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode response");
                return;
            }
        };
        match self.transport.send(peer, path.as_str(), payload).await {
            Ok(()) => tracing::debug!(
                request_id = response.correlation_id.as_deref().unwrap_or("-"),
                success = response.success,
                "response sent"
            ),
            Err(e) => tracing::warn!(error = %e, peer, "failed to send response"),
        }
    }

    async fn process(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let id = Some(request.correlation_id.clone());
        let target = match &request.kind {
            RequestKind::Command {
                target_device_id, ..
            } => Some(*target_device_id),
            RequestKind::StatusQuery => None,
        };
        let with_target = |response: ResponseEnvelope| match target {
            Some(device) => response.with_device(device),
            None => response,
        };

        let state = self.sessions.availability();
        if let Some(code) = state.error_code() {
            tracing::info!(state = ?state, "request rejected by availability");
            return with_target(ResponseEnvelope::unavailable(id, code));
        }

        let session = match self.sessions.resolve() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "no backend session");
                let code = match e {
                    SessionError::NotConfigured => ErrorCode::BackendUnavailable,
                    SessionError::NotPaired => ErrorCode::NoDevice,
                    SessionError::Storage(_) | SessionError::Backend(_) => match target {
                        Some(_) => return with_target(ResponseEnvelope::failure(id, ErrorCode::CommandFailed)),
                        None => ErrorCode::BackendUnavailable,
                    },
                };
                return with_target(ResponseEnvelope::unavailable(id, code));
            }
        };

        match request.kind {
            RequestKind::StatusQuery => match session.client.list_devices().await {
                Ok(devices) => ResponseEnvelope::from_status(id, map_devices(&devices, None)),
                Err(e) => {
                    let code = self.backend_failure(&session, &e, ErrorCode::BackendUnavailable);
                    ResponseEnvelope::unavailable(id, code)
                }
            },
            RequestKind::Command {
                target_device_id,
                action,
            } => {
                let Some(action) = AlarmAction::parse(&action) else {
                    tracing::warn!(action = %action, "unknown alarm action");
                    return ResponseEnvelope::failure(id, ErrorCode::CommandFailed)
                        .with_device(target_device_id);
                };
                let outcome = async {
                    session.client.send_command(target_device_id, action).await?;
                    session.client.list_devices().await
                }
                .await;
                match outcome {
                    Ok(devices) => ResponseEnvelope::from_status(
                        id,
                        map_devices(&devices, Some(target_device_id)),
                    )
                    .with_device(target_device_id),
                    Err(e) => {
                        let code = self.backend_failure(&session, &e, ErrorCode::CommandFailed);
                        ResponseEnvelope::failure(id, code).with_device(target_device_id)
                    }
                }
            }
        }
    }

    /// Log a backend failure and pick the code to report.
    ///
    /// A 401 has already cleared the credentials, so it drops `session` (unless
    /// a newer one replaced it meanwhile) and reports the phone as unpaired.
    fn backend_failure(
        &self,
        session: &Arc<BackendSession>,
        error: &BackendError,
        fallback: ErrorCode,
    ) -> ErrorCode {
        if error.is_unauthorized() {
            tracing::warn!("backend rejected credentials; dropping session");
            self.sessions.invalidate_if_current(session);
            return ErrorCode::NoDevice;
        }
        tracing::warn!(error = %error, code = error.code(), "backend call failed");
        fallback
    }
}

/// Map the backend device list to the status shown on the wearable.
///
/// Uses the device with id `preferred` when present, else the first device.
/// An empty list yields a `NO_DEVICE` status.
#[must_use]
pub fn map_devices(devices: &[AlarmDevice], preferred: Option<i64>) -> DeviceStatus {
    let device = preferred
        .and_then(|id| devices.iter().find(|d| d.id == id))
        .or_else(|| devices.first());
    match device {
        Some(device) => DeviceStatus {
            device_id: Some(device.id),
            name: Some(device.name.clone()),
            fuel_level: Some(device.data.fuel_tank),
            ready: true,
            engine_temperature: Some(f64::from(device.data.engine_temp)),
            cabin_temperature: Some(f64::from(device.data.cabin_temp)),
            battery_voltage: Some(device.data.voltage),
            engine_running: Some(device.engine_running()),
            last_update_ms: Some(contract::now_ms()),
            error_code: None,
        },
        None => DeviceStatus::error(ErrorCode::NoDevice),
    }
}

impl std::fmt::Debug for CommandResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResponder")
            .field("in_flight", &self.inner.tasks.len())
            .field("shutdown", &self.inner.shutdown.is_cancelled())
            .finish()
    }
}
