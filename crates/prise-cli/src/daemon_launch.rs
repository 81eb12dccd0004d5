use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use prise_paths::PrisePaths;
use tokio::net::UnixStream;
use tracing::{info, warn};

use crate::errors::CliError;

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);
const SPAWN_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to the daemon's socket, auto-spawning `prise server` in the
/// background if nothing is listening yet (§6 "`prise` (launch client,
/// auto-connect/spawn)"). Returns once the socket accepts a connection.
pub async fn ensure_daemon_running(paths: &PrisePaths) -> Result<(), CliError> {
    let socket_path = paths.socket_path();
    if try_connect(&socket_path).await {
        return Ok(());
    }

    spawn_daemon()?;

    let deadline = tokio::time::Instant::now() + SPAWN_WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if try_connect(&socket_path).await {
            return Ok(());
        }
        tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
    }

    warn!(event = "cli.daemon.spawn_timed_out", socket = %socket_path.display());
    Err(CliError::DaemonSpawnTimedOut)
}

async fn try_connect(socket_path: &Path) -> bool {
    UnixStream::connect(socket_path).await.is_ok()
}

/// Spawns `prise server` as a session leader detached from this process's
/// controlling terminal, the way a PTY child calls `setsid()` elsewhere in
/// this codebase (§4.3) so the daemon outlives the client that started it.
fn spawn_daemon() -> Result<(), CliError> {
    let exe = std::env::current_exe()?;
    info!(event = "cli.daemon.spawn_started", exe = %exe.display());

    let mut command = Command::new(exe);
    command.arg("server").stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid().map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
            Ok(())
        });
    }
    command.spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn try_connect_fails_fast_when_nothing_listens() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!try_connect(&dir.path().join("no.sock")).await);
    }
}
