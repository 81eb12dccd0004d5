use prise_client::ClientError;

/// CLI-level errors, mapped to the exit codes in §6: 0 normal, 2 connection
/// refused, 3 session not found, 4 protocol error.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("daemon error: {0}")]
    Daemon(#[from] prise_daemon::DaemonError),

    #[error("paths error: {0}")]
    Paths(#[from] prise_paths::PathsError),

    #[error("timed out waiting for the daemon to start listening")]
    DaemonSpawnTimedOut,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("terminal error: {0}")]
    Terminal(String),
}

impl CliError {
    /// Maps this error onto one of the process exit codes §6 defines.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Client(ClientError::NotRunning { .. } | ClientError::Connect(_)) => 2,
            CliError::DaemonSpawnTimedOut => 2,
            CliError::Client(ClientError::NoSession { .. } | ClientError::CorruptSession { .. }) => 3,
            CliError::Client(ClientError::Protocol(_)) => 4,
            _ => 1,
        }
    }
}
