//! Phone-side bridge binary.
//!
//! Serves wearable requests arriving as newline-delimited JSON frames on stdin
//! and writes responses to stdout. All tracing output goes to stderr so that
//! stdout stays a clean frame channel.
//!
//! Usage: `pandora-phone-bridge [CONFIG_PATH]`
//!
//! Node ids default to `phone` (local) and the configured peer or `watch`
//! (remote); override with `PANDORA_BRIDGE_NODE_ID` / `PANDORA_BRIDGE_PEER_ID`.

use pandora_bridge::backend::HttpBackendFactory;
use pandora_bridge::bridge::{CommandResponder, SessionResolver, StdioTransport};
use pandora_bridge::config::BridgeConfig;
use pandora_bridge::storage::{
    BackendConfigStore, CredentialsStore, FileBackendConfigStore, FileCredentialsStore,
    KeyringCredentialsStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_NODE_ID: &str = "phone";
const DEFAULT_PEER_ID: &str = "watch";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pandora_bridge=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(BridgeConfig::default_config_path);
    let config = BridgeConfig::load_or_default(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", config_path.display()))?;

    let node_id = std::env::var("PANDORA_BRIDGE_NODE_ID").unwrap_or_else(|_| DEFAULT_NODE_ID.to_owned());
    let peer_id = std::env::var("PANDORA_BRIDGE_PEER_ID")
        .ok()
        .or_else(|| config.correlator.peer.clone())
        .unwrap_or_else(|| DEFAULT_PEER_ID.to_owned());
    tracing::info!(
        config = %config_path.display(),
        node = %node_id,
        peer = %peer_id,
        "pandora-phone-bridge starting"
    );

    let backend_store: Arc<dyn BackendConfigStore> =
        Arc::new(FileBackendConfigStore::new(&config.storage.backend_file));
    let credentials_store: Arc<dyn CredentialsStore> = if config.storage.use_keyring {
        Arc::new(KeyringCredentialsStore::new())
    } else {
        Arc::new(FileCredentialsStore::new(&config.storage.credentials_file))
    };

    let factory = HttpBackendFactory::new(config.backend.clone(), Arc::clone(&credentials_store));
    check_backend(&factory, backend_store.as_ref()).await;
    let events = factory.subscribe();

    let sessions = Arc::new(SessionResolver::new(
        backend_store,
        credentials_store,
        Arc::new(factory),
    ));
    tracing::info!(state = ?sessions.availability(), "initial availability");

    let shutdown = CancellationToken::new();
    let invalidation = sessions.spawn_invalidation(events, shutdown.clone());
    let (transport, mut reader) = StdioTransport::stdio(node_id, peer_id, shutdown.clone());
    let responder =
        CommandResponder::attach_with_shutdown(Arc::new(transport), sessions, shutdown.clone());

    tokio::select! {
        result = &mut reader => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "frame reader failed"),
                Err(e) => tracing::error!(error = %e, "frame reader task panicked"),
            }
            responder.drain().await;
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            }
            tracing::info!("interrupted; shutting down");
            responder.shutdown().await;
        }
    }

    shutdown.cancel();
    if !reader.is_finished() {
        reader.abort();
    }
    let _ = invalidation.await;

    tracing::info!("pandora-phone-bridge shut down cleanly");
    Ok(())
}

/// Log whether the configured backend reports ready.
async fn check_backend(factory: &HttpBackendFactory, store: &dyn BackendConfigStore) {
    match store.load() {
        Ok(Some(settings)) => match factory.build_http(&settings) {
            Ok(client) => {
                let ready = client.check_ready().await;
                tracing::info!(base_url = client.base_url(), ready, "backend readiness");
            }
            Err(e) => tracing::warn!(error = %e, "invalid backend settings"),
        },
        Ok(None) => tracing::info!("no backend configured yet"),
        Err(e) => tracing::warn!(error = %e, "failed to load backend settings"),
    }
}
