mod app;
mod cli;
mod daemon_launch;
mod errors;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use errors::CliError;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            error!(event = "cli.run_failed", error = %e);
            eprintln!("prise: {e}");
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<(), CliError> {
    let paths = prise_paths::PrisePaths::resolve()?;

    match cli.command {
        Some(Command::Server) => {
            eprintln!("Starting prise daemon in foreground (PID: {})...", std::process::id());
            let config = prise_daemon::load_daemon_config(&paths)?;
            let rt = tokio::runtime::Runtime::new().map_err(CliError::Io)?;
            rt.block_on(prise_daemon::run_server(paths, config))?;
            Ok(())
        }
        None => {
            let rt = tokio::runtime::Runtime::new().map_err(CliError::Io)?;
            rt.block_on(app::run_client(paths, cli.attach))
        }
    }
}
