//! Pandora bridge: request/response correlation between a wearable and the
//! phone that talks to the Pandora car-alarm backend.
//!
//! # Architecture
//!
//! The wearable and phone exchange fire-and-forget messages over a
//! [`bridge::Transport`]. Request/response semantics are layered on top:
//! - **Correlator** (wearable): tags each request with a correlation id,
//!   waits for the matching response or times out, caches the last status
//! - **Responder** (phone): resolves a backend session, calls the alarm
//!   backend and answers with the same correlation id
//! - **Backend**: HTTP client for the alarm service with bearer/cookie auth
//! - **Storage**: backend settings and pairing credentials (file or keyring)

pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod paths;
pub mod storage;

pub use bridge::{
    CallError, CommandResponder, Correlator, DeviceStatus, ErrorCode, SessionResolver,
    StatusPoller,
};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
