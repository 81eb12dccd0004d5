use prise_protocol::errors::{ProtocolError, WireErrorKind};

/// Client-local errors (§7 "Client local errors"), each exposing the same
/// `error_code()`/`is_user_error()` classifier shape as `DaemonError` and
/// `ProtocolError` so the UI can treat every layer's failures uniformly.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("daemon socket not found at {path}")]
    NotRunning { path: String },

    #[error("failed to connect to daemon: {0}")]
    Connect(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("daemon returned error: {}", .0.code())]
    Daemon(WireErrorKind),

    #[error("no_session: no session file found for '{name}'")]
    NoSession { name: String },

    #[error("corrupt_session: session file '{name}' is malformed: {message}")]
    CorruptSession { name: String, message: String },

    #[error("no_home_directory: $HOME is not set")]
    NoHomeDirectory,

    #[error("render_failed: {message}")]
    RenderFailed { message: String },
}

impl ClientError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::NotRunning { .. } => "not_running",
            ClientError::Connect(_) => "connect_failed",
            ClientError::Io(_) => "io",
            ClientError::Protocol(e) => e.error_code(),
            ClientError::Daemon(kind) => kind.code(),
            ClientError::NoSession { .. } => "no_session",
            ClientError::CorruptSession { .. } => "corrupt_session",
            ClientError::NoHomeDirectory => "no_home_directory",
            ClientError::RenderFailed { .. } => "render_failed",
        }
    }

    /// Whether the UI should present this as a user-actionable condition
    /// (missing session, daemon not running) rather than an internal bug.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ClientError::NotRunning { .. }
                | ClientError::NoSession { .. }
                | ClientError::CorruptSession { .. }
                | ClientError::NoHomeDirectory
        )
    }
}

impl From<prise_paths::PathsError> for ClientError {
    fn from(_: prise_paths::PathsError) -> Self {
        ClientError::NoHomeDirectory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_error_code_matches_wire_kind() {
        let e = ClientError::Daemon(WireErrorKind::UnknownPty);
        assert_eq!(e.error_code(), "unknown_pty");
    }

    #[test]
    fn not_running_is_a_user_error() {
        let e = ClientError::NotRunning { path: "/run/prise.sock".into() };
        assert!(e.is_user_error());
    }

    #[test]
    fn render_failed_is_not_a_user_error() {
        let e = ClientError::RenderFailed { message: "oops".into() };
        assert!(!e.is_user_error());
    }
}
