//! A thin, testable facade over a `tokio` current-thread runtime that gives
//! the daemon and the client the single-threaded cooperative I/O loop
//! described in §4.2: `Task` handles with cancellation, `timeout`, and
//! `wait_child_exit`, plus the one sanctioned escape hatch — a dedicated OS
//! thread draining a blocking reader into the loop via a pipe (§4.2, §9).
//!
//! This crate does not reimplement epoll/kqueue: `tokio`'s current-thread
//! runtime already is that readiness-based loop. What's missing from raw
//! `tokio` is cancellable `Task` handles that tolerate a late completion
//! after cancel, so that's what this module adds.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifies one submitted operation. Monotonic within a [`Reactor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// The result variant delivered to a completion (§4.2: "a result variant
/// `{ok-value | error-kind}`", plus the explicit `cancelled` result).
#[derive(Debug)]
pub enum Completion<T> {
    Ok(T),
    Cancelled,
    Error(std::io::Error),
}

impl<T> Completion<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Completion::Ok(v) => Some(v),
            _ => None,
        }
    }
}

/// A handle to a submitted operation. Dropping the handle does not cancel the
/// operation — call [`Task::cancel`] explicitly, matching "cancellation is
/// best-effort" (§4.2): a completion already in flight still fires.
pub struct Task<T> {
    id: TaskId,
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<Completion<T>>,
}

impl<T> Task<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Request cancellation. Best-effort: if the operation already completed
    /// or is mid-delivery, [`Task::join`] still yields its real result rather
    /// than `Cancelled` — callers must tolerate either.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Await the completion. Panics only if the underlying task itself
    /// panicked (a logic bug), never for ordinary cancellation or I/O error.
    pub async fn join(self) -> Completion<T> {
        match self.join.await {
            Ok(completion) => completion,
            Err(join_err) => {
                debug!(event = "reactor.task.join_panicked", task_id = self.id.0, error = %join_err);
                Completion::Error(std::io::Error::other(join_err.to_string()))
            }
        }
    }

    pub fn abort(&self) {
        self.join.abort();
    }
}

/// The single-threaded cooperative scheduler facade (§4.2). Cheap to clone;
/// all state is a shared atomic id counter, since the actual scheduling is
/// delegated to whichever `tokio` current-thread runtime the caller is
/// running inside.
#[derive(Debug, Default, Clone)]
pub struct Reactor {
    next_id: std::sync::Arc<AtomicU64>,
}

impl Reactor {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Submit an arbitrary cancellable async operation. `f` receives the
    /// operation's [`CancellationToken`] and should `select!` on it so a
    /// cancel request can interrupt a long-running await.
    pub fn spawn<F, Fut, T>(&self, f: F) -> Task<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, std::io::Error>> + Send + 'static,
        T: Send + 'static,
    {
        let id = self.alloc_id();
        let cancel = CancellationToken::new();
        let cancel_for_fut = cancel.clone();
        let fut = f(cancel.clone());
        let join = tokio::task::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel_for_fut.cancelled() => Completion::Cancelled,
                result = fut => match result {
                    Ok(v) => Completion::Ok(v),
                    Err(e) => Completion::Error(e),
                },
            }
        });
        Task { id, cancel, join }
    }

    /// Completes with a `timer` result after at least `dur` has elapsed
    /// (§4.2). The redraw coalescer is the only steady-state consumer of
    /// this, per §5.
    pub fn timeout(&self, dur: Duration) -> Task<()> {
        self.spawn(move |_cancel| async move {
            tokio::time::sleep(dur).await;
            Ok(())
        })
    }

    /// Waits for a child process to exit (§4.3: "the worker holds a
    /// `wait_child_exit` completion").
    pub fn wait_child_exit(&self, mut child: tokio::process::Child) -> Task<std::process::ExitStatus> {
        self.spawn(move |_cancel| async move { child.wait().await })
    }
}

/// Bridges a blocking [`std::io::Read`] (the local terminal device — §4.2,
/// §9: "cannot be made non-blocking portably") into the loop via a
/// `tokio::io::DuplexStream`, read from a dedicated OS thread. This is the
/// only multi-threaded path anywhere in the client.
pub fn spawn_blocking_reader(
    mut source: impl std::io::Read + Send + 'static,
) -> (std::thread::JoinHandle<()>, tokio::io::DuplexStream) {
    use tokio::io::AsyncWriteExt;

    let (mut tokio_write, tokio_read) = tokio::io::duplex(64 * 1024);
    let rt_handle = tokio::runtime::Handle::current();
    let join = std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = buf[..n].to_vec();
                    let write_result =
                        rt_handle.block_on(async { tokio_write.write_all(&chunk).await });
                    if write_result.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    (join, tokio_read)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_completes_ok() {
        let reactor = Reactor::new();
        let task = reactor.spawn(|_cancel| async move { Ok(42) });
        match task.join().await {
            Completion::Ok(v) => assert_eq!(v, 42),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_before_completion_yields_cancelled() {
        let reactor = Reactor::new();
        let task = reactor.spawn(|cancel| async move {
            cancel.cancelled().await;
            Ok::<_, std::io::Error>(())
        });
        task.cancel();
        match task.join().await {
            Completion::Cancelled => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn task_ids_are_monotonic() {
        let reactor = Reactor::new();
        let a = reactor.spawn(|_| async { Ok(()) });
        let b = reactor.spawn(|_| async { Ok(()) });
        assert!(b.id().0 > a.id().0);
        a.join().await;
        b.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_completes_after_duration() {
        let reactor = Reactor::new();
        let task = reactor.timeout(Duration::from_millis(50));
        tokio::time::advance(Duration::from_millis(60)).await;
        match task.join().await {
            Completion::Ok(()) => {}
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_completion_after_cancel_still_delivers_real_result() {
        // Best-effort cancellation (§4.2): a completion already queued still
        // fires. We simulate this by cancelling an already-finished task.
        let reactor = Reactor::new();
        let task = reactor.spawn(|_cancel| async move { Ok(7) });
        // Give the task a chance to finish before we cancel.
        tokio::task::yield_now().await;
        task.cancel();
        match task.join().await {
            Completion::Ok(7) => {}
            other => panic!("expected Ok(7) even though cancel raced it, got {other:?}"),
        }
    }
}
