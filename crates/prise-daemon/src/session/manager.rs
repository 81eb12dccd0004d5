use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use prise_protocol::errors::WireErrorKind;
use prise_protocol::message::Message;
use prise_protocol::wire_types::{ClientId, ExitStatus as WireExitStatus, KeyDesc, MouseDesc, PtyId, RedrawEvent};
use rmpv::ext::to_value;
use tokio::io::AsyncReadExt;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DaemonConfig;
use crate::errors::DaemonError;
use crate::pty::PtyIdAllocator;
use crate::pty::worker::PtyWorker;
use crate::screen::ScreenEngine;
use crate::session::client::ClientHandle;
use crate::session::input;
use crate::session::outbox::RedrawOutbox;

/// How often `spawn_pty_reader` rechecks whether it may resume master reads
/// once a PTY's client has crossed the high-water mark (§5 "Backpressure").
const BACKPRESSURE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One live PTY: its OS-level worker, its VT interpreter, and the set of
/// attached clients each with their own coalesced redraw outbox (§3, §4.5).
struct PtyEntry {
    worker: PtyWorker,
    engine: ScreenEngine,
    attached: HashMap<u64, RedrawOutbox>,
    exit_status: Option<WireExitStatus>,
    /// Set once the child has exited; the entry is reaped once this elapses
    /// and no client is still attached (§4.3, §7: reap timeout default 30s).
    reap_deadline: Option<Instant>,
}

impl PtyEntry {
    fn should_reap(&self) -> bool {
        self.exit_status.is_some() && self.attached.is_empty() && self.reap_deadline.is_none_or(|d| Instant::now() >= d)
    }
}

/// Introspection summary for `list_sessions`/`get_session` (§C).
#[derive(Debug, Clone)]
pub struct PtySummary {
    pub pty_id: PtyId,
    pub rows: u16,
    pub cols: u16,
    pub title: Option<String>,
    pub cwd: Option<String>,
    pub attached_clients: usize,
    pub exited: bool,
}

/// Holds every live PTY and connected client (§4.5). Wrapped in
/// `Arc<RwLock<_>>` by the server. The single-thread invariant (§5) is
/// approximated here by serializing all mutation through the lock rather
/// than a literal one-thread loop, since the daemon fans a connection task
/// out per client.
pub struct SessionManager {
    ptys: HashMap<u64, PtyEntry>,
    clients: HashMap<u64, ClientHandle>,
    pty_ids: PtyIdAllocator,
    next_client_id: u64,
    config: DaemonConfig,
}

impl SessionManager {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            ptys: HashMap::new(),
            clients: HashMap::new(),
            pty_ids: PtyIdAllocator::new(),
            next_client_id: 0,
            config,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn register_client(&mut self, outbound: mpsc::UnboundedSender<Message>, disconnect: CancellationToken) -> ClientId {
        let id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(id, ClientHandle::new(outbound, disconnect));
        ClientId(id)
    }

    /// Reports that the connection task flushed `count` notifications to
    /// the client's socket, so the manager's queue-depth estimate (the
    /// practical proxy for bytes-queued-on-the-socket, §5) stays in sync
    /// instead of only ever growing.
    pub fn notify_drained(&mut self, client_id: ClientId, count: usize) {
        if let Some(client) = self.clients.get_mut(&client_id.0) {
            client.notify_drained(count);
        }
    }

    /// Whether `pty_id`'s master read should be deferred because some
    /// client attached to it is at or over the high-water mark (§5
    /// "Backpressure": "it does not submit a new master read until the
    /// client drains below a low-water mark or is forcibly detached").
    fn should_throttle_reads(&self, pty_id: PtyId) -> bool {
        let Some(entry) = self.ptys.get(&pty_id.0) else {
            return false;
        };
        let high_water = self.config.redraw_high_water;
        entry
            .attached
            .keys()
            .any(|client_id| self.clients.get(client_id).is_some_and(|c| c.queued_notifications() >= high_water))
    }

    /// Removes a client from every attach set (§4.5 "Client disconnect").
    pub fn unregister_client(&mut self, client_id: ClientId) {
        self.clients.remove(&client_id.0);
        for entry in self.ptys.values_mut() {
            entry.attached.remove(&client_id.0);
        }
        debug!(event = "daemon.session.client_unregistered", client_id = client_id.0);
    }

    fn entry(&self, pty_id: PtyId) -> Result<&PtyEntry, DaemonError> {
        self.ptys.get(&pty_id.0).ok_or(DaemonError::UnknownPty(pty_id.0))
    }

    fn entry_mut(&mut self, pty_id: PtyId) -> Result<&mut PtyEntry, DaemonError> {
        self.ptys.get_mut(&pty_id.0).ok_or(DaemonError::UnknownPty(pty_id.0))
    }

    fn insert_pty(
        &mut self,
        rows: u16,
        cols: u16,
        attach: Option<ClientId>,
        cwd: Option<&str>,
    ) -> Result<(PtyId, Box<dyn std::io::Read + Send>), DaemonError> {
        let (worker, reader) = PtyWorker::spawn(&self.config.shell, rows, cols, cwd)?;
        let engine = ScreenEngine::new(rows, cols);
        let pty_id = self.pty_ids.next_id();

        let mut attached = HashMap::new();
        if let Some(client_id) = attach {
            attached.insert(client_id.0, RedrawOutbox::new());
        }

        self.ptys.insert(
            pty_id.0,
            PtyEntry {
                worker,
                engine,
                attached,
                exit_status: None,
                reap_deadline: None,
            },
        );
        info!(event = "daemon.session.spawn_pty_completed", pty_id = pty_id.0, rows = rows, cols = cols);
        Ok((pty_id, reader))
    }

    /// `spawn_pty` (§4.5). Spawns the reader task that drives this PTY's
    /// Screen Engine for the rest of its life.
    pub async fn spawn_pty(
        manager: &Arc<RwLock<Self>>,
        rows: u16,
        cols: u16,
        attach: Option<ClientId>,
        cwd: Option<&str>,
    ) -> Result<PtyId, DaemonError> {
        let (pty_id, reader) = {
            let mut guard = manager.write().await;
            guard.insert_pty(rows, cols, attach, cwd)?
        };
        let chunk_size = manager.read().await.config.read_chunk_bytes;
        spawn_pty_reader(manager.clone(), pty_id, reader, chunk_size);
        Ok(pty_id)
    }

    /// `attach_pty` (§4.5): adds the client to the attach set and
    /// immediately drains a full-redraw notification to that client alone,
    /// without waiting for the next chunk of child output.
    pub fn attach_pty(&mut self, client_id: ClientId, pty_id: PtyId) -> Result<(), DaemonError> {
        let entry = self.entry_mut(pty_id)?;
        entry.attached.entry(client_id.0).or_insert_with(RedrawOutbox::new);
        entry.engine.force_full_redraw();
        let events = entry.engine.flush();
        for (id, outbox) in entry.attached.iter_mut() {
            outbox.merge(&events);
            if *id == client_id.0 {
                let drained = outbox.take();
                if let Some(client) = self.clients.get_mut(id) {
                    client.send(redraw_message(pty_id, drained));
                }
            }
        }
        debug!(event = "daemon.session.client_attached", client_id = client_id.0, pty_id = pty_id.0);
        Ok(())
    }

    /// `detach_ptys` (§4.5). Idempotent; unknown PTYs are silently skipped.
    pub fn detach_ptys(&mut self, client_id: ClientId, pty_ids: &[PtyId]) {
        for pty_id in pty_ids {
            if let Some(entry) = self.ptys.get_mut(&pty_id.0) {
                entry.attached.remove(&client_id.0);
            }
        }
    }

    /// `resize_pty` (§4.5, Resolved Open Question D.2: last-requested size
    /// wins regardless of other attached clients).
    pub fn resize_pty(&mut self, pty_id: PtyId, rows: u16, cols: u16, width_px: u16, height_px: u16) -> Result<(), DaemonError> {
        let entry = self.entry_mut(pty_id)?;
        entry.worker.resize(rows, cols, width_px, height_px)?;
        entry.engine.resize(rows, cols);
        let events = entry.engine.flush();
        fan_out(pty_id, &mut entry.attached, &mut self.clients, &events);
        Ok(())
    }

    /// `close_pty` (§4.5). `portable_pty`'s `Child` abstraction has no
    /// portable "send arbitrary signal" primitive, so this uses `kill()`
    /// rather than a literal SIGHUP — the nearest portable equivalent.
    pub fn close_pty(&mut self, pty_id: PtyId) -> Result<(), DaemonError> {
        let entry = self.entry_mut(pty_id)?;
        entry.worker.kill()?;
        info!(event = "daemon.session.close_pty", pty_id = pty_id.0);
        Ok(())
    }

    /// `key_input` notification (§4.5).
    pub fn key_input(&mut self, pty_id: PtyId, key: &KeyDesc) -> Result<(), DaemonError> {
        let entry = self.entry_mut(pty_id)?;
        let app_cursor = entry.engine.mode().contains(alacritty_terminal::term::TermMode::APP_CURSOR);
        let bytes = input::encode_key(&key.key, &key.code, key.ctrl_key, key.alt_key, key.shift_key, app_cursor);
        entry.worker.write_input(&bytes)
    }

    /// `mouse_input` notification (§4.5).
    pub fn mouse_input(&mut self, pty_id: PtyId, mouse: &MouseDesc) -> Result<(), DaemonError> {
        let entry = self.entry_mut(pty_id)?;
        let mode = entry.engine.mode();
        let col = mouse.x.max(0.0) as u16;
        let row = mouse.y.max(0.0) as u16;
        if let Some(bytes) = input::encode_mouse(mouse, col, row, mode) {
            entry.worker.write_input(&bytes)?;
        }
        Ok(())
    }

    /// `paste` notification (§4.5).
    pub fn paste(&mut self, pty_id: PtyId, data: &[u8]) -> Result<(), DaemonError> {
        let entry = self.entry_mut(pty_id)?;
        let wrapped = input::wrap_paste(data, entry.engine.mode());
        entry.worker.write_input(&wrapped)
    }

    pub fn ping(&self) -> &'static str {
        "pong"
    }

    pub fn list_sessions(&self) -> Vec<PtySummary> {
        self.ptys
            .iter()
            .map(|(id, entry)| PtySummary {
                pty_id: PtyId(*id),
                rows: entry.engine.rows(),
                cols: entry.engine.cols(),
                title: entry.worker.title().map(str::to_string),
                cwd: entry.worker.cwd_hint().map(str::to_string),
                attached_clients: entry.attached.len(),
                exited: entry.exit_status.is_some(),
            })
            .collect()
    }

    pub fn get_session(&self, pty_id: PtyId) -> Result<PtySummary, DaemonError> {
        let entry = self.entry(pty_id)?;
        Ok(PtySummary {
            pty_id,
            rows: entry.engine.rows(),
            cols: entry.engine.cols(),
            title: entry.worker.title().map(str::to_string),
            cwd: entry.worker.cwd_hint().map(str::to_string),
            attached_clients: entry.attached.len(),
            exited: entry.exit_status.is_some(),
        })
    }

    /// Feeds one chunk of PTY output through the Screen Engine and fans the
    /// resulting redraw out to every attached client, applying backpressure
    /// (§4.3, §4.5, §5).
    fn handle_pty_output(&mut self, pty_id: PtyId, bytes: &[u8]) {
        let Some(entry) = self.ptys.get_mut(&pty_id.0) else {
            return;
        };
        entry.engine.advance(bytes);
        for write in entry.engine.take_pending_writes() {
            if let Err(e) = entry.worker.write_input(&write) {
                warn!(event = "daemon.session.osc_response_write_failed", pty_id = pty_id.0, error = %e);
            }
        }
        let events = entry.engine.flush();

        let high_water = self.config.redraw_high_water;
        let low_water = self.config.redraw_low_water;
        let timeout = Duration::from_secs(self.config.disconnect_timeout_secs);
        let mut to_disconnect = Vec::new();

        for (client_id, outbox) in entry.attached.iter_mut() {
            outbox.merge(&events);
            let Some(client) = self.clients.get_mut(client_id) else {
                continue;
            };
            if client.queued_notifications() >= high_water {
                if client.mark_over_water() >= timeout {
                    to_disconnect.push(*client_id);
                }
                continue;
            }
            if client.queued_notifications() <= low_water {
                client.clear_over_water();
            }
            if outbox.has_pending() {
                let drained = outbox.take();
                client.send(redraw_message(pty_id, drained));
            }
        }

        for client_id in to_disconnect {
            warn!(event = "daemon.session.backpressure_disconnect", client_id = client_id, pty_id = pty_id.0);
            entry.attached.remove(&client_id);
            if let Some(client) = self.clients.get_mut(&client_id) {
                let params = to_value(WireErrorKind::BackpressureDisconnect).unwrap_or(rmpv::Value::Nil);
                client.send(Message::notification("error", params));
                client.disconnect();
            }
        }
    }

    /// EOF/read-error from the master: records the exit and notifies every
    /// attached client (§4.3 "Child exit"). The entry itself stays alive
    /// until [`PtyEntry::should_reap`] is true, so a reattach after crash
    /// still sees the final output.
    fn handle_pty_exit(&mut self, pty_id: PtyId) {
        let reap_timeout = Duration::from_secs(self.config.reap_timeout_secs);
        let Some(entry) = self.ptys.get_mut(&pty_id.0) else {
            return;
        };
        let status = entry.worker.wait().ok();
        let wire_status = WireExitStatus {
            code: status.as_ref().map(|s| s.exit_code() as i32),
            signal: None,
        };
        entry.exit_status = Some(wire_status);
        entry.reap_deadline = Some(Instant::now() + reap_timeout);

        let params = to_value((pty_id, wire_status)).unwrap_or(rmpv::Value::Nil);
        let message = Message::notification("pty_exited", params);
        for client_id in entry.attached.keys() {
            if let Some(client) = self.clients.get_mut(client_id) {
                client.send(message.clone());
            }
        }
        info!(event = "daemon.session.pty_exited", pty_id = pty_id.0);
    }

    /// Drops reaped PTY entries: exited, unattached, and past the reap
    /// deadline. Called periodically by the server loop.
    pub fn reap_exited(&mut self) {
        let dead: Vec<u64> = self
            .ptys
            .iter()
            .filter(|(_, e)| e.should_reap())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            self.ptys.remove(&id);
            debug!(event = "daemon.session.pty_reaped", pty_id = id);
        }
    }
}

fn fan_out(pty_id: PtyId, attached: &mut HashMap<u64, RedrawOutbox>, clients: &mut HashMap<u64, ClientHandle>, events: &[RedrawEvent]) {
    for (client_id, outbox) in attached.iter_mut() {
        outbox.merge(events);
        if let Some(client) = clients.get_mut(client_id) {
            let drained = outbox.take();
            client.send(redraw_message(pty_id, drained));
        }
    }
}

/// `redraw` params are `(pty_id, events)` (§4.4, §6) so a client attached to
/// more than one PTY over its single connection can demultiplex which
/// surface a notification belongs to.
fn redraw_message(pty_id: PtyId, events: Vec<RedrawEvent>) -> Message {
    let params = to_value((pty_id, events)).unwrap_or(rmpv::Value::Nil);
    Message::notification("redraw", params)
}

/// Bridges the PTY master's blocking reader into the async world via
/// [`prise_reactor::spawn_blocking_reader`] and drives `handle_pty_output`/
/// `handle_pty_exit` for as long as the PTY lives (§4.2, §4.3).
fn spawn_pty_reader(manager: Arc<RwLock<SessionManager>>, pty_id: PtyId, reader: Box<dyn std::io::Read + Send>, chunk_size: usize) {
    tokio::spawn(async move {
        let (_thread, mut duplex) = prise_reactor::spawn_blocking_reader(reader);
        let mut buf = vec![0u8; chunk_size.max(4096)];
        loop {
            while manager.read().await.should_throttle_reads(pty_id) {
                tokio::time::sleep(BACKPRESSURE_POLL_INTERVAL).await;
            }
            match duplex.read(&mut buf).await {
                Ok(0) => {
                    manager.write().await.handle_pty_exit(pty_id);
                    break;
                }
                Ok(n) => {
                    manager.write().await.handle_pty_output(pty_id, &buf[..n]);
                }
                Err(e) => {
                    warn!(event = "daemon.session.pty_read_failed", pty_id = pty_id.0, error = %e);
                    manager.write().await.handle_pty_exit(pty_id);
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_shell() -> crate::config::ShellConfig {
        crate::config::ShellConfig {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "cat".to_string()],
        }
    }

    /// Inserts a PTY backed by a real `cat` child without going through the
    /// async `spawn_pty`/`spawn_pty_reader` pair, so tests can drive
    /// `handle_pty_output` directly and deterministically.
    fn spawn_test_pty(manager: &mut SessionManager, attach: Option<ClientId>) -> PtyId {
        let original = std::mem::replace(&mut manager.config.shell, echo_shell());
        let (pty_id, _reader) = manager.insert_pty(24, 80, attach, None).unwrap();
        manager.config.shell = original;
        pty_id
    }

    fn kill_pty(manager: &mut SessionManager, pty_id: PtyId) {
        if let Some(entry) = manager.ptys.get_mut(&pty_id.0) {
            let _ = entry.worker.kill();
            let _ = entry.worker.wait();
        }
    }

    fn register_test_client(manager: &mut SessionManager) -> (ClientId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client_id = manager.register_client(tx, CancellationToken::new());
        (client_id, rx)
    }

    #[test]
    fn attach_pty_sends_a_full_redraw_to_the_newly_attached_client_only() {
        let mut manager = SessionManager::new(DaemonConfig::default());
        let pty_id = spawn_test_pty(&mut manager, None);
        let (client_a, mut rx_a) = register_test_client(&mut manager);
        let (client_b, mut rx_b) = register_test_client(&mut manager);

        manager.attach_pty(client_a, pty_id).unwrap();
        assert!(rx_a.try_recv().is_ok(), "newly attached client should see an immediate redraw");
        assert!(rx_b.try_recv().is_err(), "a client that never attached must not receive anything");

        manager.attach_pty(client_b, pty_id).unwrap();
        assert!(rx_b.try_recv().is_ok());

        kill_pty(&mut manager, pty_id);
    }

    #[test]
    fn attach_pty_rejects_an_unknown_pty() {
        let mut manager = SessionManager::new(DaemonConfig::default());
        let (client_id, _rx) = register_test_client(&mut manager);
        let result = manager.attach_pty(client_id, PtyId(999));
        assert!(matches!(result, Err(DaemonError::UnknownPty(999))));
    }

    #[test]
    fn resize_pty_fans_the_redraw_out_to_every_attached_client() {
        let mut manager = SessionManager::new(DaemonConfig::default());
        let (client_a, mut rx_a) = register_test_client(&mut manager);
        let (client_b, mut rx_b) = register_test_client(&mut manager);
        let pty_id = spawn_test_pty(&mut manager, Some(client_a));
        manager.attach_pty(client_b, pty_id).unwrap();
        rx_a.try_recv().ok();
        rx_b.try_recv().ok();

        manager.resize_pty(pty_id, 30, 100, 0, 0).unwrap();
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());

        kill_pty(&mut manager, pty_id);
    }

    #[test]
    fn handle_pty_output_fans_redraw_events_to_attached_clients_under_water() {
        let mut manager = SessionManager::new(DaemonConfig::default());
        let (client_id, mut rx) = register_test_client(&mut manager);
        let pty_id = spawn_test_pty(&mut manager, Some(client_id));

        manager.handle_pty_output(pty_id, b"hi\r\n");
        assert!(rx.try_recv().is_ok(), "a client under the water mark should receive the redraw");
        assert!(manager.clients.contains_key(&client_id.0), "the client must stay attached");

        kill_pty(&mut manager, pty_id);
    }

    #[test]
    fn handle_pty_output_disconnects_a_client_stuck_over_water_past_the_timeout() {
        let mut config = DaemonConfig::default();
        config.redraw_high_water = 0;
        config.disconnect_timeout_secs = 0;
        let mut manager = SessionManager::new(config);
        let (client_id, mut rx) = register_test_client(&mut manager);
        let pty_id = spawn_test_pty(&mut manager, Some(client_id));
        rx.try_recv().ok();

        manager.handle_pty_output(pty_id, b"hi\r\n");

        let entry = manager.ptys.get(&pty_id.0).unwrap();
        assert!(!entry.attached.contains_key(&client_id.0), "a client stuck over water past the timeout must be detached");

        let mut saw_backpressure_error = false;
        while let Ok(message) = rx.try_recv() {
            if let Message::Notification { method, .. } = message {
                if method == "error" {
                    saw_backpressure_error = true;
                }
            }
        }
        assert!(saw_backpressure_error, "the client should be told why it was disconnected");

        kill_pty(&mut manager, pty_id);
    }

    #[test]
    fn should_throttle_reads_is_false_once_no_attached_client_is_over_water() {
        let mut config = DaemonConfig::default();
        config.redraw_high_water = 1;
        let mut manager = SessionManager::new(config);
        let (client_id, _rx) = register_test_client(&mut manager);
        let pty_id = spawn_test_pty(&mut manager, Some(client_id));

        assert!(!manager.should_throttle_reads(pty_id));
        manager.handle_pty_output(pty_id, b"hi\r\n");
        assert!(manager.should_throttle_reads(pty_id), "one queued notification already meets a high_water of 1");

        manager.notify_drained(client_id, 1);
        assert!(!manager.should_throttle_reads(pty_id));

        kill_pty(&mut manager, pty_id);
    }

    #[test]
    fn detach_ptys_is_idempotent_for_unknown_pty_ids() {
        let mut manager = SessionManager::new(DaemonConfig::default());
        let (client_id, _rx) = register_test_client(&mut manager);
        manager.detach_ptys(client_id, &[PtyId(42)]);
    }

    #[test]
    fn unregister_client_clears_every_attach_set_the_client_was_in() {
        let mut manager = SessionManager::new(DaemonConfig::default());
        let (client_id, _rx) = register_test_client(&mut manager);
        let pty_a = spawn_test_pty(&mut manager, Some(client_id));
        let pty_b = spawn_test_pty(&mut manager, Some(client_id));

        manager.unregister_client(client_id);

        assert!(!manager.ptys.get(&pty_a.0).unwrap().attached.contains_key(&client_id.0));
        assert!(!manager.ptys.get(&pty_b.0).unwrap().attached.contains_key(&client_id.0));

        kill_pty(&mut manager, pty_a);
        kill_pty(&mut manager, pty_b);
    }
}
