//! Newline-delimited JSON frames over a byte stream.
//!
//! Each frame is one line:
//!
//! ```text
//! {"source":"phone","target":"watch","path":"/pandora/status/response","data":"<base64>"}
//! ```
//!
//! When wired to the process stdin/stdout, stdout is reserved for frames and
//! all diagnostics must go to stderr.

use super::{HandlerSlot, MessageHandler, RawMessage, Transport, TransportError};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    source: String,
    target: String,
    path: String,
    data: String,
}

/// Point-to-point transport to the single node on the other end of a stream.
#[derive(Clone)]
pub struct StdioTransport {
    local_id: String,
    remote_id: String,
    writer: Arc<Mutex<BufWriter<BoxedWriter>>>,
    slot: HandlerSlot,
}

impl StdioTransport {
    /// Create a transport writing frames to `writer`.
    ///
    /// Call [`Self::spawn_reader`] to start receiving.
    pub fn new<W>(local_id: impl Into<String>, remote_id: impl Into<String>, writer: W) -> Self
    where
        W: AsyncWrite + Send + 'static,
    {
        Self {
            local_id: local_id.into(),
            remote_id: remote_id.into(),
            writer: Arc::new(Mutex::new(BufWriter::new(Box::pin(writer)))),
            slot: HandlerSlot::default(),
        }
    }

    /// Transport over the process stdin/stdout.
    pub fn stdio(
        local_id: impl Into<String>,
        remote_id: impl Into<String>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<crate::Result<()>>) {
        let transport = Self::new(local_id, remote_id, tokio::io::stdout());
        let reader = transport.spawn_reader(tokio::io::stdin(), shutdown);
        (transport, reader)
    }

    /// Read frames from `reader` until EOF or `shutdown`, dispatching each to
    /// the registered handler. Malformed frames are logged and skipped.
    pub fn spawn_reader<R>(
        &self,
        reader: R,
        shutdown: CancellationToken,
    ) -> JoinHandle<crate::Result<()>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let slot = self.slot.clone();
        let local_id = self.local_id.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();

            loop {
                buf.clear();
                let bytes_read = tokio::select! {
                    () = shutdown.cancelled() => {
                        tracing::debug!("frame reader cancelled");
                        break;
                    }
                    read = reader.read_until(b'\n', &mut buf) => read.map_err(|e| {
                        crate::BridgeError::Transport(format!("failed to read frame: {e}"))
                    })?,
                };

                if bytes_read == 0 {
                    tracing::info!("frame stream closed (EOF)");
                    break;
                }

                let line = match std::str::from_utf8(&buf) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping non-UTF-8 frame");
                        continue;
                    }
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_frame(trimmed, &local_id) {
                    Ok(Some(message)) => slot.deliver(message),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed frame");
                    }
                }
            }
            Ok(())
        })
    }
}

fn parse_frame(line: &str, local_id: &str) -> Result<Option<RawMessage>, String> {
    let frame: Frame = serde_json::from_str(line).map_err(|e| e.to_string())?;
    if frame.target != local_id {
        tracing::debug!(target_node = %frame.target, "frame addressed to another node; dropping");
        return Ok(None);
    }
    let payload = BASE64
        .decode(frame.data.as_bytes())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    Ok(Some(RawMessage {
        source: frame.source,
        path: frame.path,
        payload,
    }))
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, peer: &str, path: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if peer != self.remote_id {
            return Err(TransportError::UnknownPeer(peer.to_owned()));
        }
        let frame = Frame {
            source: self.local_id.clone(),
            target: peer.to_owned(),
            path: path.to_owned(),
            data: BASE64.encode(payload),
        };
        let json = serde_json::to_string(&frame).map_err(|e| TransportError::Io(e.to_string()))?;

        let mut writer = self.writer.lock().await;
        write_line(&mut writer, &json).await
    }

    async fn connected_peers(&self) -> Result<Vec<String>, TransportError> {
        Ok(vec![self.remote_id.clone()])
    }

    fn set_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.slot.set(Some(handler));
    }

    fn clear_handler(&self) {
        self.slot.set(None);
    }
}

/// Write a single JSON line and flush.
async fn write_line(writer: &mut BufWriter<BoxedWriter>, json: &str) -> Result<(), TransportError> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| TransportError::Io(format!("failed to write frame: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| TransportError::Io(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::Io(format!("failed to flush frame: {e}")))?;
    Ok(())
}
