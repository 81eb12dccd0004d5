use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use prise_protocol::codec::{DEFAULT_MAX_FRAME_BYTES, decode_message_bounded, encode_message};
use prise_protocol::errors::{ProtocolError, WireErrorKind};
use prise_protocol::message::{Message, RequestIdAllocator};
use rmpv::Value;
use rmpv::ext::{from_value, to_value};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

use crate::errors::ClientError;

/// Async daemon connection: one writer half, one reader task dispatching
/// responses back to their caller and forwarding notifications (`redraw`,
/// `pty_exited`) to the caller-owned channel (§4.1) over a single
/// bidirectional MessagePack socket.
pub struct RpcClient {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Arc<Mutex<HashMap<u32, oneshot::Sender<(Value, Value)>>>>,
    req_ids: Mutex<RequestIdAllocator>,
    notifications: mpsc::UnboundedReceiver<Message>,
    reader_task: tokio::task::JoinHandle<()>,
    writer_task: tokio::task::JoinHandle<()>,
}

impl RpcClient {
    /// Connect to the daemon's Unix socket at `socket_path`.
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        if !socket_path.exists() {
            return Err(ClientError::NotRunning {
                path: socket_path.display().to_string(),
            });
        }
        let stream = UnixStream::connect(socket_path).await.map_err(ClientError::Connect)?;
        let (mut read_half, mut write_half) = stream.into_split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Arc<Mutex<HashMap<u32, oneshot::Sender<(Value, Value)>>>> = Arc::new(Mutex::new(HashMap::new()));

        let writer_task = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match encode_message(&message) {
                    Ok(bytes) => {
                        if write_half.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(event = "client.rpc.encode_failed", error = %e),
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_task = tokio::spawn(async move {
            let mut buf: Vec<u8> = Vec::new();
            let mut chunk = [0u8; 8192];
            'outer: loop {
                match read_half.read(&mut chunk).await {
                    Ok(0) => {
                        debug!(event = "client.rpc.connection_closed");
                        break 'outer;
                    }
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        loop {
                            match decode_message_bounded(&buf, DEFAULT_MAX_FRAME_BYTES) {
                                Ok(Some((message, consumed))) => {
                                    buf.drain(..consumed);
                                    match message {
                                        Message::Response { req_id, error, result } => {
                                            let mut table = reader_pending.lock().await;
                                            match table.remove(&req_id) {
                                                Some(tx) => {
                                                    let _ = tx.send((error, result));
                                                }
                                                None => {
                                                    // a response with no matching in-flight request is a
                                                    // protocol violation, not something to shrug off: the
                                                    // req_id space is only ever reused after wrapping, so
                                                    // this means the daemon and client have desynced.
                                                    warn!(event = "client.rpc.unexpected_response", req_id = req_id);
                                                    break 'outer;
                                                }
                                            }
                                        }
                                        notif @ Message::Notification { .. } => {
                                            if notify_tx.send(notif).is_err() {
                                                break 'outer;
                                            }
                                        }
                                        Message::Request { method, .. } => {
                                            warn!(event = "client.rpc.unexpected_request", method = %method);
                                        }
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    warn!(event = "client.rpc.frame_error", error = %e);
                                    break 'outer;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(event = "client.rpc.read_failed", error = %e);
                        break 'outer;
                    }
                }
            }
            // drop every still-pending request so callers waiting in
            // `request()` get woken with a closed-connection error instead
            // of hanging forever once the reader has given up.
            reader_pending.lock().await.clear();
        });

        Ok(Self {
            outbound: outbound_tx,
            pending,
            req_ids: Mutex::new(RequestIdAllocator::new()),
            notifications: notify_rx,
            reader_task,
            writer_task,
        })
    }

    /// Send a request and await its response, decoding `result` as `T` on
    /// success (§4.1). A non-nil `error` is surfaced as [`ClientError::Daemon`].
    pub async fn request<T: serde::de::DeserializeOwned>(&self, method: &str, params: impl Serialize) -> Result<T, ClientError> {
        let req_id = self.req_ids.lock().await.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(req_id, tx);

        let params = to_value(params).unwrap_or(Value::Nil);
        let message = Message::request(req_id, method, params);
        if self.outbound.send(message).is_err() {
            self.pending.lock().await.remove(&req_id);
            return Err(ClientError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "rpc writer task is gone")));
        }

        let (error, result) = rx.await.map_err(|_| ClientError::Protocol(ProtocolError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection closed before response"))))?;
        if !error.is_nil() {
            let kind: WireErrorKind = from_value(error).unwrap_or(WireErrorKind::Internal);
            return Err(ClientError::Daemon(kind));
        }
        from_value(result).map_err(|e| ClientError::Protocol(ProtocolError::MalformedEncoding(e.to_string())))
    }

    /// Send a fire-and-forget notification (`key_input`, `mouse_input`, `paste`, `resize_pty`).
    pub fn notify(&self, method: &str, params: impl Serialize) -> Result<(), ClientError> {
        let params = to_value(params).unwrap_or(Value::Nil);
        self.outbound
            .send(Message::notification(method, params))
            .map_err(|_| ClientError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "rpc writer task is gone")))
    }

    /// Receive the next server-to-client notification (`redraw`, `pty_exited`).
    pub async fn recv_notification(&mut self) -> Option<Message> {
        self.notifications.recv().await
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_fails_fast_when_socket_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = RpcClient::connect(&dir.path().join("no.sock")).await;
        assert!(matches!(result, Err(ClientError::NotRunning { .. })));
    }
}
