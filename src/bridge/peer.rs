//! Resolution of the peer node requests are sent to.

use super::transport::{Transport, TransportError};
use std::sync::Mutex;

/// Remembers which node answers wearable requests.
///
/// A configured peer is always used as is. Otherwise the first connected node
/// is looked up on first use and cached until [`PeerDirectory::forget`].
#[derive(Debug, Default)]
pub struct PeerDirectory {
    fixed: Option<String>,
    cached: Mutex<Option<String>>,
}

impl PeerDirectory {
    /// Resolve lazily from the transport's connected nodes.
    #[must_use]
    pub fn discover() -> Self {
        Self::default()
    }

    /// Always use `peer`.
    pub fn fixed(peer: impl Into<String>) -> Self {
        Self {
            fixed: Some(peer.into()),
            cached: Mutex::new(None),
        }
    }

    /// Build from an optional configured peer id.
    #[must_use]
    pub fn from_config(peer: Option<&str>) -> Self {
        match peer.map(str::trim).filter(|p| !p.is_empty()) {
            Some(peer) => Self::fixed(peer),
            None => Self::discover(),
        }
    }

    /// The peer to send to, discovering one when needed.
    pub async fn resolve(&self, transport: &dyn Transport) -> Result<String, TransportError> {
        if let Some(peer) = &self.fixed {
            return Ok(peer.clone());
        }
        if let Some(peer) = self.cached() {
            return Ok(peer);
        }

        let peers = transport.connected_peers().await?;
        let Some(first) = peers.into_iter().next() else {
            return Err(TransportError::NoPeer);
        };

        // Another caller may have resolved concurrently; keep the first value.
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        let peer = cached.get_or_insert(first).clone();
        tracing::debug!(peer = %peer, "resolved wearable peer");
        Ok(peer)
    }

    /// Drop the cached peer so the next call rediscovers.
    pub fn forget(&self) {
        if self.fixed.is_none() {
            *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }
    }

    fn cached(&self) -> Option<String> {
        self.cached.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::bridge::transport::MemoryHub;

    #[tokio::test]
    async fn fixed_peer_skips_discovery() {
        let hub = MemoryHub::new();
        let watch = hub.join("watch");
        let directory = PeerDirectory::fixed("phone-9");
        assert_eq!(directory.resolve(&watch).await.unwrap(), "phone-9");
    }

    #[tokio::test]
    async fn discovers_and_caches_first_peer() {
        let hub = MemoryHub::new();
        let watch = hub.join("watch");
        let _phone = hub.join("phone");
        let directory = PeerDirectory::discover();

        assert_eq!(directory.resolve(&watch).await.unwrap(), "phone");
        hub.leave("phone");
        assert_eq!(directory.resolve(&watch).await.unwrap(), "phone");

        directory.forget();
        assert_eq!(
            directory.resolve(&watch).await.unwrap_err(),
            TransportError::NoPeer
        );
    }

    #[test]
    fn blank_configured_peer_means_discover() {
        assert!(PeerDirectory::from_config(Some("  ")).fixed.is_none());
        assert_eq!(
            PeerDirectory::from_config(Some("phone")).fixed.as_deref(),
            Some("phone")
        );
    }
}
