pub mod config;
pub mod errors;
pub mod pid;
pub mod pty;
pub mod screen;
pub mod server;
pub mod session;

pub use config::{DaemonConfig, ShellConfig, load_daemon_config};
pub use errors::DaemonError;
pub use server::run_server;
pub use session::{PtySummary, SessionManager};
