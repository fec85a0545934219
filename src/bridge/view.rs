//! Wearable presentation model.
//!
//! [`WatchUiState`] is driven by [`next_state`] and turned into a
//! [`WatchView`] by [`render`]. Both are pure; the poller owns the timing.

use super::contract::{DeviceStatus, ErrorCode};
use super::correlator::CallError;
use crate::backend::AlarmAction;

const MSG_BACKEND_UNAVAILABLE: &str =
    "Backend unavailable. Check the server settings in the phone app.";
const MSG_NO_DEVICE: &str = "No Pandora device paired. Add a device in the phone app.";
const MSG_NOT_READY: &str = "Phone not ready. Open the Pandora app on the phone.";
const MSG_SET_UP: &str = "Set up the app on your phone.";
const MSG_NO_PHONE: &str = "No connection to the phone.";
const MSG_COMMAND_FAILED: &str = "Command failed.";
const MSG_LOADING: &str = "Fetching data…";
const PLACEHOLDER: &str = "--";

/// What the wearable screen is showing.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchUiState {
    /// First fetch in progress, nothing to show yet.
    Loading,
    /// The phone answered but cannot serve alarm data.
    NotReady {
        last_known: Option<DeviceStatus>,
        message: String,
    },
    Ready(DeviceStatus),
    /// The call failed; stale data may still be shown.
    Error {
        message: String,
        last_known: Option<DeviceStatus>,
    },
}

/// Inputs to [`next_state`].
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A poll is about to start.
    RefreshStarted,
    /// A status or command call returned a status.
    StatusReceived(DeviceStatus),
    /// A status poll failed.
    RefreshFailed(CallError),
    /// A command call failed.
    CommandFailed(CallError),
}

/// Advance the UI state. `last_known` is the most recent status the wearable
/// has seen, kept across failures.
#[must_use]
pub fn next_state(
    current: &WatchUiState,
    event: WatchEvent,
    last_known: Option<&DeviceStatus>,
) -> WatchUiState {
    match event {
        WatchEvent::RefreshStarted => match last_known {
            None => WatchUiState::Loading,
            Some(_) => current.clone(),
        },
        WatchEvent::StatusReceived(status) => {
            if status.ready && status.error_code.is_none() {
                WatchUiState::Ready(status)
            } else {
                let message = message_for_code(status.error_code.as_deref());
                WatchUiState::NotReady {
                    last_known: Some(status),
                    message,
                }
            }
        }
        WatchEvent::RefreshFailed(error) => failed(error, last_known, MSG_NO_PHONE),
        WatchEvent::CommandFailed(error) => failed(error, last_known, MSG_COMMAND_FAILED),
    }
}

fn failed(error: CallError, last_known: Option<&DeviceStatus>, fallback: &str) -> WatchUiState {
    let last_known = last_known.cloned();
    match error {
        CallError::BackendUnavailable | CallError::NoDevice | CallError::NotReady => {
            WatchUiState::NotReady {
                last_known,
                message: message_for_code(Some(error.code())),
            }
        }
        CallError::CommandFailed(_) => WatchUiState::Error {
            message: MSG_COMMAND_FAILED.to_owned(),
            last_known,
        },
        _ => WatchUiState::Error {
            message: fallback.to_owned(),
            last_known,
        },
    }
}

/// Human-readable text for an error code.
#[must_use]
pub fn message_for_code(code: Option<&str>) -> String {
    match code.map(|c| (c, ErrorCode::parse(c))) {
        Some((_, Some(ErrorCode::BackendUnavailable))) => MSG_BACKEND_UNAVAILABLE.to_owned(),
        Some((_, Some(ErrorCode::NoDevice))) => MSG_NO_DEVICE.to_owned(),
        Some((_, Some(ErrorCode::NotReady))) => MSG_NOT_READY.to_owned(),
        Some((_, Some(ErrorCode::CommandFailed))) => MSG_COMMAND_FAILED.to_owned(),
        Some((raw, _)) => raw.to_owned(),
        None => MSG_SET_UP.to_owned(),
    }
}

/// Which screen layout to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    NotReady,
    Ready,
    Error,
}

/// The action the engine button would trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandButton {
    pub device_id: i64,
    pub action: AlarmAction,
}

/// Render-ready screen content.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchView {
    pub screen: Screen,
    /// Car name on the dashboard, the message elsewhere.
    pub headline: String,
    pub engine_temp: String,
    pub voltage: String,
    pub fuel: String,
    pub engine_on: bool,
    /// Present only when a command may be sent.
    pub command: Option<CommandButton>,
    /// Metrics come from an older status.
    pub stale: bool,
}

/// Project a state into screen content.
#[must_use]
pub fn render(state: &WatchUiState) -> WatchView {
    match state {
        WatchUiState::Loading => WatchView {
            screen: Screen::Loading,
            headline: MSG_LOADING.to_owned(),
            ..metrics(None, false)
        },
        WatchUiState::Ready(status) => {
            let mut view = metrics(Some(status), false);
            view.screen = Screen::Ready;
            view.headline = status.name.clone().unwrap_or_else(|| "Pandora".to_owned());
            view.command = status.device_id.map(|device_id| CommandButton {
                device_id,
                action: if view.engine_on {
                    AlarmAction::Stop
                } else {
                    AlarmAction::Start
                },
            });
            view
        }
        WatchUiState::NotReady {
            last_known,
            message,
        } => WatchView {
            screen: Screen::NotReady,
            headline: message.clone(),
            ..metrics(last_known.as_ref(), true)
        },
        WatchUiState::Error {
            message,
            last_known,
        } => WatchView {
            screen: Screen::Error,
            headline: message.clone(),
            ..metrics(last_known.as_ref(), true)
        },
    }
}

fn metrics(status: Option<&DeviceStatus>, stale: bool) -> WatchView {
    let engine_on = status.and_then(|s| s.engine_running).unwrap_or(false);
    WatchView {
        screen: Screen::Loading,
        headline: String::new(),
        engine_temp: format_metric(status.and_then(|s| s.engine_temperature), "°"),
        voltage: format_metric(status.and_then(|s| s.battery_voltage), "V"),
        fuel: status
            .and_then(|s| s.fuel_level)
            .map_or_else(|| PLACEHOLDER.to_owned(), |f| format!("{f}%")),
        engine_on,
        command: None,
        stale: stale && status.is_some(),
    }
}

fn format_metric(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| PLACEHOLDER.to_owned(), |v| format!("{v}{unit}"))
}
