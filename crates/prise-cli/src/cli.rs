use clap::{Parser, Subcommand};

/// `prise`: launch the client (auto-connect/spawn), `prise --attach <name>`
/// (restore a detached session), `prise server` (run the daemon in the
/// foreground) — the minimal CLI surface §6 calls out as non-core.
#[derive(Debug, Parser)]
#[command(name = "prise", version, about = "A terminal multiplexer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Restore a previously detached session by name (§4.8).
    #[arg(long, value_name = "NAME")]
    pub attach: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground instead of auto-spawning it.
    Server,
}
