use serde::{Deserialize, Serialize};

/// Errors kinds surfaced on the wire as a response's `error` value.
///
/// Mirrors the classifier pattern of a daemon-side error enum: every variant
/// maps to a stable `kind` string via [`WireErrorKind::code`] so the same
/// identifier is used in logs, in the wire payload, and in client-side
/// matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireErrorKind {
    UnknownMethod,
    UnknownPty,
    SpawnFailed { os_errno: i32 },
    WriteFailed { os_errno: i32 },
    InvalidParams,
    TooLarge,
    BackpressureDisconnect,
    Internal,
}

impl WireErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            WireErrorKind::UnknownMethod => "unknown_method",
            WireErrorKind::UnknownPty => "unknown_pty",
            WireErrorKind::SpawnFailed { .. } => "spawn_failed",
            WireErrorKind::WriteFailed { .. } => "write_failed",
            WireErrorKind::InvalidParams => "invalid_params",
            WireErrorKind::TooLarge => "too_large",
            WireErrorKind::BackpressureDisconnect => "backpressure_disconnect",
            WireErrorKind::Internal => "internal",
        }
    }

    /// Whether the condition closes the connection rather than just failing
    /// the one in-flight request (§4.1, §7: only oversized/malformed frames
    /// terminate the socket).
    pub fn closes_connection(&self) -> bool {
        matches!(self, WireErrorKind::TooLarge)
    }
}

/// Local (non-wire) errors produced by the framing/codec layer itself.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
    #[error("frame exceeds maximum size ({size} > {max})")]
    TooLarge { size: usize, max: usize },
    #[error("response {req_id} has no matching in-flight request")]
    UnexpectedResponse { req_id: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::MalformedEncoding(_) => "malformed_encoding",
            ProtocolError::TooLarge { .. } => "too_large",
            ProtocolError::UnexpectedResponse { .. } => "unexpected_response",
            ProtocolError::Io(_) => "io",
        }
    }

    pub fn is_user_error(&self) -> bool {
        // All of these are protocol-level violations by a peer, never a
        // local resource/config problem.
        matches!(
            self,
            ProtocolError::MalformedEncoding(_)
                | ProtocolError::TooLarge { .. }
                | ProtocolError::UnexpectedResponse { .. }
        )
    }
}
