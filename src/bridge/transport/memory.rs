//! In-process transport connecting named nodes through a shared hub.

use super::{HandlerSlot, MessageHandler, RawMessage, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry of nodes reachable through [`MemoryTransport`].
#[derive(Clone, Default)]
pub struct MemoryHub {
    nodes: Arc<Mutex<HashMap<String, HandlerSlot>>>,
}

impl MemoryHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a node with id `node_id` and return its transport.
    pub fn join(&self, node_id: impl Into<String>) -> MemoryTransport {
        let node_id = node_id.into();
        let slot = HandlerSlot::default();
        self.lock().insert(node_id.clone(), slot.clone());
        MemoryTransport {
            node_id,
            slot,
            hub: self.clone(),
        }
    }

    /// Disconnect `node_id`; later sends to it fail with `UnknownPeer`.
    pub fn leave(&self, node_id: &str) {
        self.lock().remove(node_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, HandlerSlot>> {
        self.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One node's view of a [`MemoryHub`].
///
/// Delivery happens on a freshly spawned task per message, so messages may
/// arrive in any order relative to each other.
#[derive(Clone)]
pub struct MemoryTransport {
    node_id: String,
    slot: HandlerSlot,
    hub: MemoryHub,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, peer: &str, path: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let target = self
            .hub
            .lock()
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError::UnknownPeer(peer.to_owned()))?;

        let message = RawMessage {
            source: self.node_id.clone(),
            path: path.to_owned(),
            payload,
        };
        tokio::spawn(async move {
            target.deliver(message);
        });
        Ok(())
    }

    async fn connected_peers(&self) -> Result<Vec<String>, TransportError> {
        let mut peers: Vec<String> = self
            .hub
            .lock()
            .keys()
            .filter(|id| **id != self.node_id)
            .cloned()
            .collect();
        peers.sort();
        Ok(peers)
    }

    fn set_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.slot.set(Some(handler));
    }

    fn clear_handler(&self) {
        self.slot.set(None);
    }
}
