//! Wearable/phone correlation bridge.
//!
//! The wearable issues calls through a [`Correlator`]; the phone answers them
//! with a [`CommandResponder`] backed by a [`SessionResolver`]. Both sides sit
//! on a fire-and-forget [`Transport`].
//!
//! ```text
//! caller -> Correlator -> Transport ~~> CommandResponder -> backend
//!        <-            <- Transport <~~                  <-
//! ```

pub mod availability;
pub mod contract;
pub mod correlator;
pub mod pairing;
pub mod peer;
pub mod poller;
pub mod responder;
pub mod session;
pub mod transport;
pub mod view;

pub use availability::AvailabilityState;
pub use contract::{
    DeviceStatus, ErrorCode, MessagePath, RequestEnvelope, RequestKind, ResponseEnvelope,
};
pub use correlator::{CallError, Correlator};
pub use pairing::{Pairing, PairingError};
pub use peer::PeerDirectory;
pub use poller::StatusPoller;
pub use responder::CommandResponder;
pub use session::{BackendSession, SessionError, SessionResolver};
pub use transport::{MemoryHub, MemoryTransport, StdioTransport, Transport, TransportError};
pub use view::{WatchUiState, WatchView, next_state, render};
