//! Fire-and-forget message transport between the wearable and the phone.
//!
//! A transport delivers a byte payload to a named peer on a named path and
//! hands every inbound payload to the registered [`MessageHandler`]. It pairs
//! nothing, orders nothing and times nothing out; the correlator builds
//! call/response semantics on top.

mod memory;
mod stdio;

pub use memory::{MemoryHub, MemoryTransport};
pub use stdio::StdioTransport;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A payload received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Node id of the sender.
    pub source: String,
    /// Logical path the payload was sent on.
    pub path: String,
    pub payload: Vec<u8>,
}

/// Receives inbound payloads. Called from transport tasks; must not block.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: RawMessage);
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("peer {0} is not connected")]
    UnknownPeer(String),

    #[error("no connected peer")]
    NoPeer,

    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Message channel to peer nodes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand `payload` to `peer` on `path`. Returns once handed off.
    async fn send(&self, peer: &str, path: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Nodes currently reachable.
    async fn connected_peers(&self) -> Result<Vec<String>, TransportError>;

    /// Register the inbound handler, replacing any previous one.
    fn set_handler(&self, handler: Arc<dyn MessageHandler>);

    /// Drop the inbound handler.
    fn clear_handler(&self);
}

/// Shared slot holding the current inbound handler.
#[derive(Clone, Default)]
pub(crate) struct HandlerSlot {
    inner: Arc<Mutex<Option<Arc<dyn MessageHandler>>>>,
}

impl HandlerSlot {
    pub(crate) fn set(&self, handler: Option<Arc<dyn MessageHandler>>) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = handler;
    }

    pub(crate) fn get(&self) -> Option<Arc<dyn MessageHandler>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Deliver to the current handler, dropping the message when none is set.
    pub(crate) fn deliver(&self, message: RawMessage) {
        match self.get() {
            Some(handler) => handler.on_message(message),
            None => tracing::debug!(path = %message.path, "no handler registered; dropping message"),
        }
    }
}
