//! Wearable/phone message envelopes.
//!
//! Four logical message kinds travel over the transport, each on its own path.
//! Payloads are snake_case JSON; unknown fields are ignored so older peers that
//! still send `protocol_version` keep working.

use serde::{Deserialize, Serialize};

/// Logical message paths, one per message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessagePath {
    StatusRequest,
    StatusResponse,
    CommandRequest,
    CommandResponse,
}

impl MessagePath {
    /// Render the path to its wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusRequest => "/pandora/status/get",
            Self::StatusResponse => "/pandora/status/response",
            Self::CommandRequest => "/pandora/command",
            Self::CommandResponse => "/pandora/command/response",
        }
    }

    /// Parse a wire path.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "/pandora/status/get" => Some(Self::StatusRequest),
            "/pandora/status/response" => Some(Self::StatusResponse),
            "/pandora/command" => Some(Self::CommandRequest),
            "/pandora/command/response" => Some(Self::CommandResponse),
            _ => None,
        }
    }

    /// The path a response to this request travels on.
    #[must_use]
    pub fn response_path(self) -> Self {
        match self {
            Self::StatusRequest | Self::StatusResponse => Self::StatusResponse,
            Self::CommandRequest | Self::CommandResponse => Self::CommandResponse,
        }
    }

    #[must_use]
    pub fn is_request(self) -> bool {
        matches!(self, Self::StatusRequest | Self::CommandRequest)
    }
}

/// Error codes carried in `status.error` or the command response `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No backend configured, or the backend could not be reached.
    BackendUnavailable,
    /// Backend configured but this phone is not paired.
    NoDevice,
    /// The backend rejected the operation or it failed unexpectedly.
    CommandFailed,
    /// The request envelope could not be parsed.
    IncompatibleProtocol,
    /// The phone side is not ready to serve requests.
    NotReady,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::NoDevice => "NO_DEVICE",
            Self::CommandFailed => "COMMAND_FAILED",
            Self::IncompatibleProtocol => "INCOMPATIBLE_PROTOCOL",
            Self::NotReady => "NOT_READY",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "BACKEND_UNAVAILABLE" => Some(Self::BackendUnavailable),
            "NO_DEVICE" => Some(Self::NoDevice),
            "COMMAND_FAILED" => Some(Self::CommandFailed),
            "INCOMPATIBLE_PROTOCOL" => Some(Self::IncompatibleProtocol),
            "NOT_READY" => Some(Self::NotReady),
            _ => None,
        }
    }
}

/// Snapshot of one alarm device as shown on the wearable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceStatus {
    #[serde(rename = "alarm_device_id")]
    pub device_id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "fuel_tank")]
    pub fuel_level: Option<i32>,
    #[serde(rename = "is_ready")]
    pub ready: bool,
    #[serde(rename = "engine_temp")]
    pub engine_temperature: Option<f64>,
    #[serde(rename = "cabin_temp")]
    pub cabin_temperature: Option<f64>,
    #[serde(rename = "voltage")]
    pub battery_voltage: Option<f64>,
    pub engine_running: Option<bool>,
    pub last_update_ms: Option<i64>,
    #[serde(rename = "error")]
    pub error_code: Option<String>,
}

impl DeviceStatus {
    /// A not-ready status carrying only an error code.
    #[must_use]
    pub fn error(code: ErrorCode) -> Self {
        Self {
            ready: false,
            error_code: Some(code.as_str().to_owned()),
            last_update_ms: Some(now_ms()),
            ..Self::default()
        }
    }

    /// The carried error code, if it is one this crate knows.
    #[must_use]
    pub fn known_error(&self) -> Option<ErrorCode> {
        self.error_code.as_deref().and_then(ErrorCode::parse)
    }
}

/// Wall clock in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// What a request asks the phone to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    StatusQuery,
    Command {
        target_device_id: i64,
        /// Raw action name; validated by the responder.
        action: String,
    },
}

/// One outgoing request, immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub correlation_id: String,
    pub kind: RequestKind,
}

impl RequestEnvelope {
    #[must_use]
    pub fn status_query(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            kind: RequestKind::StatusQuery,
        }
    }

    #[must_use]
    pub fn command(
        correlation_id: impl Into<String>,
        target_device_id: i64,
        action: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            kind: RequestKind::Command {
                target_device_id,
                action: action.into(),
            },
        }
    }

    /// Path this request is sent on.
    #[must_use]
    pub fn path(&self) -> MessagePath {
        match self.kind {
            RequestKind::StatusQuery => MessagePath::StatusRequest,
            RequestKind::Command { .. } => MessagePath::CommandRequest,
        }
    }

    /// Serialize to the wire payload for [`Self::path`].
    pub fn encode(&self) -> Result<Vec<u8>, ContractError> {
        let bytes = match &self.kind {
            RequestKind::StatusQuery => serde_json::to_vec(&StatusRequestWire {
                request_id: self.correlation_id.clone(),
            }),
            RequestKind::Command {
                target_device_id,
                action,
            } => serde_json::to_vec(&CommandRequestWire {
                alarm_device_id: *target_device_id,
                action: action.clone(),
                request_id: self.correlation_id.clone(),
            }),
        };
        bytes.map_err(|e| ContractError::Encode(e.to_string()))
    }
}

/// One response, in the shape the correlator consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// `None` only when the responder could not parse the request.
    pub correlation_id: Option<String>,
    pub alarm_device_id: Option<i64>,
    pub success: bool,
    /// `None` when no usable session was reached.
    pub status: Option<DeviceStatus>,
    /// Top-level error code for failures that carry no status.
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Successful response carrying `status`.
    #[must_use]
    pub fn success(correlation_id: Option<String>, status: DeviceStatus) -> Self {
        Self {
            correlation_id,
            alarm_device_id: status.device_id,
            success: true,
            status: Some(status),
            error: None,
        }
    }

    /// Response for a mapped status: successful unless the status carries an
    /// error code.
    #[must_use]
    pub fn from_status(correlation_id: Option<String>, status: DeviceStatus) -> Self {
        if status.error_code.is_some() {
            return Self {
                correlation_id,
                alarm_device_id: status.device_id,
                success: false,
                status: Some(status),
                error: None,
            };
        }
        Self::success(correlation_id, status)
    }

    /// Failed response whose status carries `code`.
    #[must_use]
    pub fn unavailable(correlation_id: Option<String>, code: ErrorCode) -> Self {
        Self {
            correlation_id,
            alarm_device_id: None,
            success: false,
            status: Some(DeviceStatus::error(code)),
            error: None,
        }
    }

    /// Failed response without a status.
    #[must_use]
    pub fn failure(correlation_id: Option<String>, code: ErrorCode) -> Self {
        Self {
            correlation_id,
            alarm_device_id: None,
            success: false,
            status: None,
            error: Some(code.as_str().to_owned()),
        }
    }

    /// Echo the device a command targeted.
    #[must_use]
    pub fn with_device(mut self, alarm_device_id: i64) -> Self {
        self.alarm_device_id = Some(alarm_device_id);
        self
    }

    /// The error code explaining a failure: the top-level code first, then
    /// the one inside `status`.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.status.as_ref().and_then(|s| s.error_code.as_deref()))
    }

    /// Serialize for `path` (status or command response).
    ///
    /// Status responses have no `success` field on the wire; a failed status
    /// response without a status is sent as a `COMMAND_FAILED` status so the
    /// receiver still sees it as a failure.
    pub fn encode(&self, path: MessagePath) -> Result<Vec<u8>, ContractError> {
        let bytes = match path {
            MessagePath::StatusResponse | MessagePath::StatusRequest => {
                let status = match (&self.status, self.success) {
                    (Some(status), _) => Some(status.clone()),
                    (None, true) => None,
                    (None, false) => {
                        let code = self
                            .error
                            .as_deref()
                            .and_then(ErrorCode::parse)
                            .unwrap_or(ErrorCode::CommandFailed);
                        Some(DeviceStatus::error(code))
                    }
                };
                serde_json::to_vec(&StatusResponseWire {
                    request_id: self.correlation_id.clone(),
                    alarm_device_id: self.alarm_device_id,
                    status,
                })
            }
            MessagePath::CommandResponse | MessagePath::CommandRequest => {
                serde_json::to_vec(&CommandResponseWire {
                    alarm_device_id: self.alarm_device_id,
                    success: self.success,
                    request_id: self.correlation_id.clone(),
                    status: self.status.clone(),
                    error: self.error.clone(),
                })
            }
        };
        bytes.map_err(|e| ContractError::Encode(e.to_string()))
    }
}

/// A decoded inbound message, dispatched once by path.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(RequestEnvelope),
    Response(ResponseEnvelope),
}

/// Envelope encode/decode failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// The path is not one of the four known message paths.
    #[error("unknown message path: {0}")]
    UnknownPath(String),

    /// The payload on a known path could not be parsed.
    #[error("malformed {} payload: {reason}", .path.as_str())]
    Malformed { path: MessagePath, reason: String },

    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

/// Decode `payload` received on `path` into a typed message.
pub fn decode(path: &str, payload: &[u8]) -> Result<Inbound, ContractError> {
    let Some(kind) = MessagePath::parse(path) else {
        return Err(ContractError::UnknownPath(path.to_owned()));
    };
    let malformed = |e: serde_json::Error| ContractError::Malformed {
        path: kind,
        reason: e.to_string(),
    };

    match kind {
        MessagePath::StatusRequest => {
            let wire: StatusRequestWire = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(Inbound::Request(RequestEnvelope::status_query(
                wire.request_id,
            )))
        }
        MessagePath::CommandRequest => {
            let wire: CommandRequestWire = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(Inbound::Request(RequestEnvelope::command(
                wire.request_id,
                wire.alarm_device_id,
                wire.action,
            )))
        }
        MessagePath::StatusResponse => {
            let wire: StatusResponseWire = serde_json::from_slice(payload).map_err(malformed)?;
            let success = wire
                .status
                .as_ref()
                .is_some_and(|s| s.error_code.is_none());
            Ok(Inbound::Response(ResponseEnvelope {
                correlation_id: wire.request_id,
                alarm_device_id: wire.alarm_device_id,
                success,
                status: wire.status,
                error: None,
            }))
        }
        MessagePath::CommandResponse => {
            let wire: CommandResponseWire = serde_json::from_slice(payload).map_err(malformed)?;
            Ok(Inbound::Response(ResponseEnvelope {
                correlation_id: wire.request_id,
                alarm_device_id: wire.alarm_device_id,
                success: wire.success,
                status: wire.status,
                error: wire.error,
            }))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusRequestWire {
    request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommandRequestWire {
    alarm_device_id: i64,
    action: String,
    request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponseWire {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    alarm_device_id: Option<i64>,
    #[serde(default)]
    status: Option<DeviceStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommandResponseWire {
    #[serde(default)]
    alarm_device_id: Option<i64>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    status: Option<DeviceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn sample_status() -> DeviceStatus {
        DeviceStatus {
            device_id: Some(7),
            name: Some("Car1".to_owned()),
            fuel_level: Some(50),
            ready: true,
            engine_temperature: Some(85.0),
            cabin_temperature: Some(21.5),
            battery_voltage: Some(12.6),
            engine_running: Some(false),
            last_update_ms: Some(1_700_000_000_000),
            error_code: None,
        }
    }

    #[test]
    fn paths_parse_their_own_wire_form() {
        for path in [
            MessagePath::StatusRequest,
            MessagePath::StatusResponse,
            MessagePath::CommandRequest,
            MessagePath::CommandResponse,
        ] {
            assert_eq!(MessagePath::parse(path.as_str()), Some(path));
        }
        assert_eq!(MessagePath::parse("/pandora/unknown"), None);
    }

    #[test]
    fn command_request_reaches_responder_intact() {
        let request = RequestEnvelope::command("r1", 7, "start");
        let bytes = request.encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"alarm_device_id": 7, "action": "start", "request_id": "r1"})
        );

        match decode(request.path().as_str(), &bytes).unwrap() {
            Inbound::Request(decoded) => assert_eq!(decoded, request),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn status_object_uses_snake_case_names() {
        let value = serde_json::to_value(sample_status()).unwrap();
        assert_eq!(value["alarm_device_id"], 7);
        assert_eq!(value["fuel_tank"], 50);
        assert_eq!(value["is_ready"], true);
        assert_eq!(value["cabin_temp"], 21.5);
        assert_eq!(value["engine_temp"], 85.0);
        assert_eq!(value["voltage"], 12.6);
        assert!(value["error"].is_null());
    }

    #[test]
    fn status_response_without_error_is_success() {
        let raw = json!({
            "request_id": "abc123",
            "alarm_device_id": 7,
            "status": {"name": "Car1", "fuel_tank": 50, "is_ready": true},
            "protocol_version": 2
        });
        let bytes = serde_json::to_vec(&raw).unwrap();
        let Inbound::Response(response) = decode("/pandora/status/response", &bytes).unwrap()
        else {
            panic!("expected response");
        };
        assert!(response.success);
        assert_eq!(response.correlation_id.as_deref(), Some("abc123"));
        let status = response.status.unwrap();
        assert_eq!(status.name.as_deref(), Some("Car1"));
        assert_eq!(status.fuel_level, Some(50));
    }

    #[test]
    fn status_response_with_error_code_is_failure() {
        let response = ResponseEnvelope::unavailable(Some("s1".into()), ErrorCode::NoDevice);
        let bytes = response.encode(MessagePath::StatusResponse).unwrap();
        let Inbound::Response(decoded) = decode("/pandora/status/response", &bytes).unwrap()
        else {
            panic!("expected response");
        };
        assert!(!decoded.success);
        assert_eq!(decoded.error_code(), Some("NO_DEVICE"));
    }

    #[test]
    fn failed_status_response_without_status_still_fails() {
        let response = ResponseEnvelope::failure(Some("s2".into()), ErrorCode::BackendUnavailable);
        let bytes = response.encode(MessagePath::StatusResponse).unwrap();
        let Inbound::Response(decoded) = decode("/pandora/status/response", &bytes).unwrap()
        else {
            panic!("expected response");
        };
        assert!(!decoded.success);
        assert_eq!(decoded.error_code(), Some("BACKEND_UNAVAILABLE"));
    }

    #[test]
    fn command_failure_has_null_status() {
        let response =
            ResponseEnvelope::failure(Some("c1".into()), ErrorCode::CommandFailed).with_device(7);
        let bytes = response.encode(MessagePath::CommandResponse).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["status"].is_null());
        assert_eq!(value["request_id"], "c1");
        assert_eq!(value["alarm_device_id"], 7);
        assert_eq!(value["error"], "COMMAND_FAILED");
    }

    #[test]
    fn protocol_error_response_has_null_id() {
        let response = ResponseEnvelope::failure(None, ErrorCode::IncompatibleProtocol);
        let bytes = response.encode(MessagePath::CommandResponse).unwrap();
        let Inbound::Response(decoded) = decode("/pandora/command/response", &bytes).unwrap()
        else {
            panic!("expected response");
        };
        assert_eq!(decoded.correlation_id, None);
    }

    #[test]
    fn malformed_payload_reports_path() {
        let err = decode("/pandora/command", b"{\"action\":\"start\"}").unwrap_err();
        assert!(matches!(
            err,
            ContractError::Malformed {
                path: MessagePath::CommandRequest,
                ..
            }
        ));
    }

    #[test]
    fn unknown_path_is_rejected() {
        let err = decode("/other/app", b"{}").unwrap_err();
        assert_eq!(err, ContractError::UnknownPath("/other/app".to_owned()));
    }

    #[test]
    fn error_codes_round_trip_their_names() {
        for code in [
            ErrorCode::BackendUnavailable,
            ErrorCode::NoDevice,
            ErrorCode::CommandFailed,
            ErrorCode::IncompatibleProtocol,
            ErrorCode::NotReady,
        ] {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
    }
}
