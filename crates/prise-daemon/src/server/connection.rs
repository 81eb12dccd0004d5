use std::sync::Arc;

use prise_protocol::codec::{DEFAULT_MAX_FRAME_BYTES, decode_message_bounded, encode_message};
use prise_protocol::message::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::server::dispatch;
use crate::session::SessionManager;

/// Drives one client connection for its lifetime: a writer task that
/// serializes outbound [`Message`]s onto the socket, and a read loop that
/// buffers bytes and decodes complete frames with
/// [`decode_message_bounded`] (the codec is buffer-based, not stream-based,
/// so unconsumed bytes are retained across reads — §4.1).
pub async fn handle_connection(stream: UnixStream, manager: Arc<RwLock<SessionManager>>, shutdown: CancellationToken) {
    let (mut read_half, mut write_half) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let disconnect = CancellationToken::new();

    let client_id = manager.write().await.register_client(outbound_tx.clone(), disconnect.clone());

    let writer_manager = manager.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match encode_message(&message) {
                Ok(bytes) => {
                    if write_half.write_all(&bytes).await.is_err() {
                        break;
                    }
                    writer_manager.write().await.notify_drained(client_id, 1);
                }
                Err(e) => warn!(event = "daemon.connection.encode_failed", error = %e),
            }
        }
    });

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];

    'read: loop {
        tokio::select! {
            result = read_half.read(&mut chunk) => {
                match result {
                    Ok(0) => {
                        debug!(event = "daemon.connection.closed", client_id = client_id.0);
                        break 'read;
                    }
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        loop {
                            match decode_message_bounded(&buf, DEFAULT_MAX_FRAME_BYTES) {
                                Ok(Some((message, consumed))) => {
                                    buf.drain(..consumed);
                                    dispatch::handle_message(&manager, client_id, message, &outbound_tx).await;
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    // malformed encoding or an oversized frame: §4.1/§7 both close the connection.
                                    warn!(event = "daemon.connection.frame_error", client_id = client_id.0, error = %e);
                                    break 'read;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(event = "daemon.connection.read_failed", client_id = client_id.0, error = %e);
                        break 'read;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                debug!(event = "daemon.connection.shutdown", client_id = client_id.0);
                break 'read;
            }
            _ = disconnect.cancelled() => {
                debug!(event = "daemon.connection.forced_disconnect", client_id = client_id.0);
                break 'read;
            }
        }
    }

    manager.write().await.unregister_client(client_id);
    drop(outbound_tx);
    let _ = writer_task.await;
}
