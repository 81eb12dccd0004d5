use std::time::Instant;

use prise_protocol::message::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Per-connected-client state the Session Manager tracks (§3 "Client",
/// §4.5, §5 backpressure). The socket itself lives in
/// `server::connection`; this only holds what the manager needs to decide
/// fan-out and backpressure without reaching into the connection task.
pub struct ClientHandle {
    outbound: mpsc::UnboundedSender<Message>,
    queued_notifications: usize,
    over_water_since: Option<Instant>,
    disconnect: CancellationToken,
}

impl ClientHandle {
    pub fn new(outbound: mpsc::UnboundedSender<Message>, disconnect: CancellationToken) -> Self {
        Self {
            outbound,
            queued_notifications: 0,
            over_water_since: None,
            disconnect,
        }
    }

    /// Sends one notification toward this client's connection task. Tracks
    /// queue depth as a practical proxy for "bytes queued on the socket"
    /// (§4.5, §5): the connection task's mpsc channel is the actual queue,
    /// and `unbounded_send` never blocks, so this count is how the manager
    /// estimates backpressure without awaiting the socket itself.
    pub fn send(&mut self, message: Message) {
        if self.outbound.send(message).is_err() {
            warn!(event = "daemon.session.client_send_after_close");
            return;
        }
        self.queued_notifications += 1;
    }

    /// Called once a connection task reports it flushed a notification to
    /// the socket, so the manager's estimate stays in sync.
    pub fn notify_drained(&mut self, count: usize) {
        self.queued_notifications = self.queued_notifications.saturating_sub(count);
    }

    pub fn queued_notifications(&self) -> usize {
        self.queued_notifications
    }

    /// Marks the instant this client first crossed the high-water mark, if
    /// not already marked. Returns the duration it's been over water.
    pub fn mark_over_water(&mut self) -> std::time::Duration {
        let now = Instant::now();
        let since = *self.over_water_since.get_or_insert(now);
        now.duration_since(since)
    }

    pub fn clear_over_water(&mut self) {
        self.over_water_since = None;
    }

    /// Forcibly closes this client's connection (§4.3, §5 "Backpressure
    /// disconnect"). The connection task's read loop observes this and
    /// tears itself down, which in turn calls
    /// [`crate::session::SessionManager::unregister_client`] and clears
    /// every attach set the client was part of.
    pub fn disconnect(&self) {
        self.disconnect.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmpv::Value;

    #[test]
    fn send_increments_queue_depth() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = ClientHandle::new(tx, CancellationToken::new());
        client.send(Message::notification("redraw", Value::Nil));
        assert_eq!(client.queued_notifications(), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn drained_reduces_queue_depth_without_underflow() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut client = ClientHandle::new(tx, CancellationToken::new());
        client.notify_drained(5);
        assert_eq!(client.queued_notifications(), 0);
    }

    #[test]
    fn over_water_timer_starts_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut client = ClientHandle::new(tx, CancellationToken::new());
        let first = client.mark_over_water();
        let second = client.mark_over_water();
        assert!(second >= first);
        client.clear_over_water();
    }

    #[test]
    fn disconnect_cancels_the_connection_token() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let client = ClientHandle::new(tx, token.clone());
        assert!(!token.is_cancelled());
        client.disconnect();
        assert!(token.is_cancelled());
    }
}
