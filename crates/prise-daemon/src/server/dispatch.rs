use std::sync::Arc;

use prise_protocol::errors::WireErrorKind;
use prise_protocol::message::Message;
use prise_protocol::wire_types::{ClientId, KeyDesc, MouseDesc, PtyId, ResizePtyParams, SpawnPtyParams};
use rmpv::Value;
use rmpv::ext::{from_value, to_value};
use tokio::sync::{RwLock, mpsc};
use tracing::warn;

use crate::errors::DaemonError;
use crate::session::SessionManager;

/// Handles one decoded [`Message`] for `client_id`. Requests get a response
/// written back through `outbound`; notifications never reply (§4.1, §4.5,
/// §6's method table).
pub async fn handle_message(
    manager: &Arc<RwLock<SessionManager>>,
    client_id: ClientId,
    message: Message,
    outbound: &mpsc::UnboundedSender<Message>,
) {
    match message {
        Message::Request { req_id, method, params } => {
            let result = dispatch_request(manager, client_id, &method, params).await;
            let response = match result {
                Ok(value) => Message::ok_response(req_id, value),
                Err(kind) => Message::err_response(req_id, to_value(&kind).unwrap_or(Value::Nil)),
            };
            let _ = outbound.send(response);
        }
        Message::Notification { method, params } => {
            dispatch_notification(manager, client_id, &method, params).await;
        }
        Message::Response { req_id, .. } => {
            warn!(event = "daemon.dispatch.unexpected_response", client_id = client_id.0, req_id = req_id);
        }
    }
}

async fn dispatch_request(
    manager: &Arc<RwLock<SessionManager>>,
    client_id: ClientId,
    method: &str,
    params: Value,
) -> Result<Value, WireErrorKind> {
    match method {
        "spawn_pty" => {
            let p: SpawnPtyParams = from_value(params).map_err(|_| WireErrorKind::InvalidParams)?;
            let attach = p.attach.then_some(client_id);
            let pty_id = SessionManager::spawn_pty(manager, p.rows, p.cols, attach, p.cwd.as_deref())
                .await
                .map_err(to_wire_err)?;
            Ok(to_value(pty_id).unwrap_or(Value::Nil))
        }
        "attach_pty" => {
            let (pty_id,): (PtyId,) = from_value(params).map_err(|_| WireErrorKind::InvalidParams)?;
            manager.write().await.attach_pty(client_id, pty_id).map_err(to_wire_err)?;
            Ok(Value::from("ok"))
        }
        "detach_ptys" => {
            let (pty_ids, _client_fd): (Vec<PtyId>, u64) = from_value(params).map_err(|_| WireErrorKind::InvalidParams)?;
            manager.write().await.detach_ptys(client_id, &pty_ids);
            Ok(Value::from("ok"))
        }
        "resize_pty" => {
            let p: ResizePtyParams = from_value(params).map_err(|_| WireErrorKind::InvalidParams)?;
            manager
                .write()
                .await
                .resize_pty(p.pty_id, p.rows, p.cols, p.width_px, p.height_px)
                .map_err(to_wire_err)?;
            Ok(Value::from("ok"))
        }
        "close_pty" => {
            let (pty_id,): (PtyId,) = from_value(params).map_err(|_| WireErrorKind::InvalidParams)?;
            manager.write().await.close_pty(pty_id).map_err(to_wire_err)?;
            Ok(Value::from("ok"))
        }
        "ping" => Ok(Value::from(manager.read().await.ping())),
        "list_sessions" => {
            let sessions = manager.read().await.list_sessions();
            Ok(to_value(
                sessions
                    .into_iter()
                    .map(|s| (s.pty_id, s.rows, s.cols, s.title, s.cwd, s.attached_clients as u64, s.exited))
                    .collect::<Vec<_>>(),
            )
            .unwrap_or(Value::Nil))
        }
        "get_session" => {
            let (pty_id,): (PtyId,) = from_value(params).map_err(|_| WireErrorKind::InvalidParams)?;
            let s = manager.read().await.get_session(pty_id).map_err(to_wire_err)?;
            Ok(to_value((s.pty_id, s.rows, s.cols, s.title, s.cwd, s.attached_clients as u64, s.exited)).unwrap_or(Value::Nil))
        }
        other => {
            warn!(event = "daemon.dispatch.unknown_method", method = other);
            Err(WireErrorKind::UnknownMethod)
        }
    }
}

async fn dispatch_notification(manager: &Arc<RwLock<SessionManager>>, _client_id: ClientId, method: &str, params: Value) {
    let result = match method {
        "key_input" => {
            let (pty_id, key): (PtyId, KeyDesc) = match from_value(params) {
                Ok(v) => v,
                Err(_) => return,
            };
            manager.write().await.key_input(pty_id, &key)
        }
        "key_release" => Ok(()),
        "mouse_input" => {
            let (pty_id, mouse): (PtyId, MouseDesc) = match from_value(params) {
                Ok(v) => v,
                Err(_) => return,
            };
            manager.write().await.mouse_input(pty_id, &mouse)
        }
        "paste" => {
            let (pty_id, text): (PtyId, String) = match from_value(params) {
                Ok(v) => v,
                Err(_) => return,
            };
            manager.write().await.paste(pty_id, text.as_bytes())
        }
        other => {
            warn!(event = "daemon.dispatch.unknown_notification", method = other);
            Ok(())
        }
    };
    if let Err(e) = result {
        warn!(event = "daemon.dispatch.notification_failed", method = method, error = %e);
    }
}

fn to_wire_err(e: DaemonError) -> WireErrorKind {
    e.wire_kind().unwrap_or(WireErrorKind::Internal)
}
