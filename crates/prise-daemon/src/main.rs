use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(event = "daemon.start_started");

    let exit_code = match run() {
        Ok(()) => {
            info!(event = "daemon.start_completed");
            0
        }
        Err(e) => {
            error!(event = "daemon.start_failed", error = %e);
            eprintln!("prise-daemon: {e}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Starting prise daemon in foreground (PID: {})...", std::process::id());

    let paths = prise_paths::PrisePaths::resolve()?;
    let config = prise_daemon::load_daemon_config(&paths)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { prise_daemon::run_server(paths, config).await })?;

    Ok(())
}
