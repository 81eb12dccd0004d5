use tokio_util::sync::CancellationToken;
use tracing::info;

/// Waits for SIGTERM or SIGINT/Ctrl-C, then cancels `token` so every task
/// selecting on it drains and exits.
pub async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(event = "daemon.server.sigterm_register_failed", error = %e);
                let _ = ctrl_c.await;
                token.cancel();
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => info!(event = "daemon.server.signal_received", signal = "SIGINT"),
            _ = sigterm.recv() => info!(event = "daemon.server.signal_received", signal = "SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!(event = "daemon.server.signal_received", signal = "SIGINT");
    }

    token.cancel();
}
