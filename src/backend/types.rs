//! Alarm backend REST payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote actions the alarm accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmAction {
    Start,
    Stop,
}

impl AlarmAction {
    /// Backend wire value (`"start"` / `"stop"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    /// Parse an action name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for AlarmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry block of an alarm device as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDeviceData {
    #[serde(rename = "fuel")]
    pub fuel_tank: i32,
    pub voltage: f64,
    pub engine_temp: i32,
    pub out_temp: i32,
    pub cabin_temp: i32,
    pub engine_rpm: i32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// One alarm device from `GET /api/alarm/devices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDevice {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub model: String,
    pub data: AlarmDeviceData,
}

impl AlarmDevice {
    /// The engine counts as running while the tachometer reads above zero.
    #[must_use]
    pub fn engine_running(&self) -> bool {
        self.data.engine_rpm > 0
    }
}

/// Response body of both pairing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PairResponse {
    pub device_id: String,
    pub token: String,
}

/// Body of `POST /api/devices/pairing/cred`.
#[derive(Debug, Serialize)]
pub(crate) struct CredentialPairRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub device_name: &'a str,
}

/// Body of `POST /api/alarm/command`.
#[derive(Debug, Serialize)]
pub(crate) struct AlarmCommandRequest {
    pub alarm_device_id: i64,
    pub action: AlarmAction,
}
