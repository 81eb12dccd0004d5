use std::io::Write;
use std::sync::{Arc, Mutex};

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::{debug, info};

use crate::config::ShellConfig;
use crate::errors::DaemonError;

/// Owns one PTY's master file descriptor and the child process it drives
/// (§3, §4.3). Resize, write, and wait are the worker's entire surface —
/// byte forwarding into the Screen Engine happens one layer up, in the
/// session manager's read loop, so the worker itself stays free of VT
/// concerns.
pub struct PtyWorker {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    size: PtySize,
    cwd_hint: Option<String>,
    title: Option<String>,
}

impl PtyWorker {
    /// Opens a PTY and spawns `shell` in it at `rows`x`cols`, `cwd` if given
    /// (§4.5 `spawn_pty`).
    pub fn spawn(
        shell: &ShellConfig,
        rows: u16,
        cols: u16,
        cwd: Option<&str>,
    ) -> Result<(Self, Box<dyn std::io::Read + Send>), DaemonError> {
        let pty_system = native_pty_system();
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system.openpty(size).map_err(|e| DaemonError::SpawnFailed {
            message: format!("openpty: {e}"),
            os_errno: io_errno(&e),
        })?;

        let mut cmd = CommandBuilder::new(&shell.program);
        cmd.args(&shell.args);
        if let Some(cwd) = cwd {
            cmd.cwd(cwd);
        }
        cmd.env("TERM", "xterm-256color");

        info!(
            event = "daemon.pty.spawn_started",
            program = %shell.program,
            rows = rows,
            cols = cols,
        );

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| DaemonError::SpawnFailed {
                message: format!("spawn: {e}"),
                os_errno: io_errno(&e),
            })?;
        // The child inherited the slave fd across fork/exec; drop our copy so
        // the kernel can deliver EOF on the master once the child exits.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| DaemonError::PtyError(format!("clone reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| DaemonError::PtyError(format!("take writer: {e}")))?;

        let worker = PtyWorker {
            master: pair.master,
            child,
            writer: Arc::new(Mutex::new(writer)),
            size,
            cwd_hint: cwd.map(|s| s.to_string()),
            title: None,
        };

        info!(
            event = "daemon.pty.spawn_completed",
            pid = ?worker.child.process_id(),
        );

        Ok((worker, reader))
    }

    pub fn size(&self) -> PtySize {
        self.size
    }

    pub fn cwd_hint(&self) -> Option<&str> {
        self.cwd_hint.as_deref()
    }

    pub fn set_cwd_hint(&mut self, cwd: String) {
        self.cwd_hint = Some(cwd);
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: String) {
        self.title = Some(title);
    }

    /// Write client-supplied input to the master. `EAGAIN` is the caller's
    /// responsibility to back off on (§4.3); any other error marks the PTY
    /// broken.
    pub fn write_input(&self, data: &[u8]) -> Result<(), DaemonError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| DaemonError::PtyError("writer lock poisoned".to_string()))?;
        writer.write_all(data).map_err(|e| DaemonError::WriteFailed {
            message: e.to_string(),
            os_errno: e.raw_os_error(),
        })?;
        writer.flush().map_err(|e| DaemonError::WriteFailed {
            message: e.to_string(),
            os_errno: e.raw_os_error(),
        })
    }

    /// Applies a resize. The kernel delivers SIGWINCH to the foreground
    /// process group as a side effect of `TIOCSWINSZ` (§4.3).
    pub fn resize(&mut self, rows: u16, cols: u16, width_px: u16, height_px: u16) -> Result<(), DaemonError> {
        let new_size = PtySize {
            rows,
            cols,
            pixel_width: width_px,
            pixel_height: height_px,
        };
        self.master
            .resize(new_size)
            .map_err(|e| DaemonError::PtyError(format!("resize: {e}")))?;
        self.size = new_size;
        debug!(event = "daemon.pty.resize_completed", rows = rows, cols = cols);
        Ok(())
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Blocking wait for child exit. Callers run this inside
    /// `tokio::task::spawn_blocking` or via [`prise_reactor::Reactor`].
    pub fn wait(&mut self) -> Result<portable_pty::ExitStatus, DaemonError> {
        self.child
            .wait()
            .map_err(|e| DaemonError::PtyError(format!("wait: {e}")))
    }

    pub fn kill(&mut self) -> Result<(), DaemonError> {
        self.child
            .kill()
            .map_err(|e| DaemonError::PtyError(format!("kill: {e}")))
    }
}

fn io_errno(e: &(dyn std::error::Error + Send + Sync + 'static)) -> Option<i32> {
    e.downcast_ref::<std::io::Error>().and_then(|e| e.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_shell() -> ShellConfig {
        ShellConfig {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "cat".to_string()],
        }
    }

    #[test]
    fn spawn_and_write_then_kill() {
        let (mut worker, _reader) = PtyWorker::spawn(&echo_shell(), 24, 80, None).unwrap();
        assert_eq!(worker.size().rows, 24);
        worker.write_input(b"hello\n").unwrap();
        worker.kill().unwrap();
        let _ = worker.wait();
    }

    #[test]
    fn resize_updates_stored_size() {
        let (mut worker, _reader) = PtyWorker::spawn(&echo_shell(), 24, 80, None).unwrap();
        worker.resize(30, 100, 0, 0).unwrap();
        assert_eq!(worker.size().rows, 30);
        assert_eq!(worker.size().cols, 100);
        worker.kill().unwrap();
        let _ = worker.wait();
    }

    #[test]
    fn title_and_cwd_hint_round_trip() {
        let (mut worker, _reader) = PtyWorker::spawn(&echo_shell(), 24, 80, None).unwrap();
        assert!(worker.title().is_none());
        worker.set_title("zsh".to_string());
        assert_eq!(worker.title(), Some("zsh"));
        worker.set_cwd_hint("/tmp".to_string());
        assert_eq!(worker.cwd_hint(), Some("/tmp"));
        worker.kill().unwrap();
        let _ = worker.wait();
    }
}
