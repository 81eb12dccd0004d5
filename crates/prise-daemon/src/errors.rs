use prise_protocol::errors::WireErrorKind;
use std::io;

/// All error types produced inside the daemon (§7).
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("unknown pty: {0}")]
    UnknownPty(u64),

    #[error("spawn failed: {message} (errno {os_errno:?})")]
    SpawnFailed {
        message: String,
        os_errno: Option<i32>,
    },

    #[error("write failed: {message} (errno {os_errno:?})")]
    WriteFailed {
        message: String,
        os_errno: Option<i32>,
    },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("pty error: {0}")]
    PtyError(String),

    #[error("daemon already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] prise_protocol::errors::ProtocolError),
}

impl DaemonError {
    /// Error code surfaced on the wire (§7) — `None` when the condition has
    /// no direct wire representation (e.g. local config/startup failures).
    pub fn wire_kind(&self) -> Option<WireErrorKind> {
        match self {
            DaemonError::UnknownPty(_) => Some(WireErrorKind::UnknownPty),
            DaemonError::SpawnFailed { os_errno, .. } => Some(WireErrorKind::SpawnFailed {
                os_errno: os_errno.unwrap_or(0),
            }),
            DaemonError::WriteFailed { os_errno, .. } => Some(WireErrorKind::WriteFailed {
                os_errno: os_errno.unwrap_or(0),
            }),
            DaemonError::InvalidParams(_) => Some(WireErrorKind::InvalidParams),
            DaemonError::PtyError(_) => Some(WireErrorKind::Internal),
            DaemonError::AlreadyRunning(_) | DaemonError::ConfigInvalid(_) => None,
            DaemonError::Io(_) => Some(WireErrorKind::Internal),
            DaemonError::Protocol(_) => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DaemonError::UnknownPty(_) => "unknown_pty",
            DaemonError::SpawnFailed { .. } => "spawn_failed",
            DaemonError::WriteFailed { .. } => "write_failed",
            DaemonError::InvalidParams(_) => "invalid_params",
            DaemonError::PtyError(_) => "pty_error",
            DaemonError::AlreadyRunning(_) => "daemon_already_running",
            DaemonError::ConfigInvalid(_) => "config_invalid",
            DaemonError::Io(_) => "io_error",
            DaemonError::Protocol(_) => "protocol_error",
        }
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DaemonError::UnknownPty(_) | DaemonError::InvalidParams(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pty_maps_to_wire_kind() {
        let e = DaemonError::UnknownPty(7);
        assert_eq!(e.error_code(), "unknown_pty");
        assert!(matches!(e.wire_kind(), Some(WireErrorKind::UnknownPty)));
        assert!(e.is_user_error());
    }

    #[test]
    fn config_invalid_has_no_wire_representation() {
        let e = DaemonError::ConfigInvalid("bad".into());
        assert!(e.wire_kind().is_none());
        assert!(!e.is_user_error());
    }

    #[test]
    fn spawn_failed_carries_errno() {
        let e = DaemonError::SpawnFailed {
            message: "openpty".into(),
            os_errno: Some(2),
        };
        match e.wire_kind() {
            Some(WireErrorKind::SpawnFailed { os_errno }) => assert_eq!(os_errno, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
