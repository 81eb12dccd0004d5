pub mod connection;
pub mod dispatch;
pub mod shutdown;

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use prise_paths::PrisePaths;
use tokio::net::UnixListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::errors::DaemonError;
use crate::pid;
use crate::session::SessionManager;

/// Runs the daemon: checks for an existing instance, binds the Unix socket
/// at `0600`, and accepts connections until a shutdown signal arrives
/// (§6 "Socket path", §C "Daemon PID file").
pub async fn run_server(paths: PrisePaths, config: DaemonConfig) -> Result<(), DaemonError> {
    let pid_path = paths.pid_file();
    let socket_path = paths.socket_path();

    if let Some(existing_pid) = pid::check_daemon_running(&pid_path) {
        return Err(DaemonError::AlreadyRunning(existing_pid));
    }
    pid::write_pid_file(&pid_path)?;

    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;

    info!(
        event = "daemon.server.started",
        pid = std::process::id(),
        socket = %socket_path.display(),
    );

    let manager = Arc::new(RwLock::new(SessionManager::new(config)));
    let shutdown = CancellationToken::new();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown::wait_for_shutdown_signal(signal_shutdown).await;
    });

    let reap_manager = manager.clone();
    let reap_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    reap_manager.write().await.reap_exited();
                }
                _ = reap_shutdown.cancelled() => break,
            }
        }
    });

    loop {
        tokio::select! {
            accept = listener.accept() => {
                match accept {
                    Ok((stream, _addr)) => {
                        let mgr = manager.clone();
                        let shutdown_token = shutdown.clone();
                        tokio::spawn(connection::handle_connection(stream, mgr, shutdown_token));
                    }
                    Err(e) => error!(event = "daemon.server.accept_failed", error = %e),
                }
            }
            _ = shutdown.cancelled() => {
                info!(event = "daemon.server.shutdown_started");
                break;
            }
        }
    }

    cleanup(&pid_path, &socket_path);
    info!(event = "daemon.server.shutdown_completed");
    Ok(())
}

fn cleanup(pid_path: &std::path::Path, socket_path: &std::path::Path) {
    if let Err(e) = pid::remove_pid_file(pid_path) {
        error!(event = "daemon.server.pid_cleanup_failed", error = %e);
    }
    if socket_path.exists()
        && let Err(e) = std::fs::remove_file(socket_path)
    {
        error!(event = "daemon.server.socket_cleanup_failed", error = %e);
    }
}
