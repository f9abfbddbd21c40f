/// Error types for decoding server responses
///
/// Design Philosophy:
/// - Decode errors describe a contract violation between client and server
/// - The batch layer may resend on them; notify and query abort immediately
/// - Each variant carries the offending line for debugging
use thiserror::Error;

/// Error categories used when reporting failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connect refused/reset, failed or truncated read or write.
    /// Retried at the layer where it occurs.
    Transport,

    /// Wrong field count, non-numeric count, unknown response shape.
    Protocol,

    /// A retry budget ran out. Terminal for the whole run.
    Exhausted,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Exhausted => "exhausted",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} fields, found {found} in response {line:?}")]
    FieldCount {
        expected: usize,
        found: usize,
        line: String,
    },

    #[error("invalid record count {value:?} in response {line:?}")]
    InvalidCount { value: String, line: String },

    #[error("unrecognized response {0:?}")]
    UnrecognizedResponse(String),
}

impl DecodeError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Protocol
    }
}
