use rmpv::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Correlates outgoing requests with their eventual response by request id
/// (§4.1: "a peer may have multiple requests in flight; responses may arrive
/// in any order").
#[derive(Debug, Default)]
pub struct PendingRequests {
    inflight: HashMap<u32, oneshot::Sender<(Value, Value)>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            inflight: HashMap::new(),
        }
    }

    /// Register a request id as in flight and return the receiver the caller
    /// awaits for `(error, result)`.
    pub fn register(&mut self, req_id: u32) -> oneshot::Receiver<(Value, Value)> {
        let (tx, rx) = oneshot::channel();
        self.inflight.insert(req_id, tx);
        rx
    }

    /// Resolve an in-flight request with its response body. Returns `Err` if
    /// `req_id` has no matching in-flight request — per the resolved open
    /// question, the caller must treat that as a protocol error and close
    /// the connection rather than guess (§9, §D.1).
    pub fn resolve(&mut self, req_id: u32, error: Value, result: Value) -> Result<(), ()> {
        match self.inflight.remove(&req_id) {
            Some(tx) => {
                let _ = tx.send((error, result));
                Ok(())
            }
            None => Err(()),
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    /// Drop all pending senders, e.g. on connection close, so waiters observe
    /// a closed channel instead of hanging forever.
    pub fn clear(&mut self) {
        self.inflight.clear();
    }
}
