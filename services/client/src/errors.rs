use shared::errors::ErrorCategory;
use shared::{DecodeError, RequestKind, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to {address} after {attempts} attempts: {source}")]
    Connect {
        address: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Decode(#[from] DecodeError),

    #[error("unexpected {request:?} response: {line:?}")]
    UnexpectedResponse { request: RequestKind, line: String },

    #[error("batch {index} not delivered after {attempts} attempts: {source}")]
    BatchDelivery {
        index: usize,
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("bet source error: {0}")]
    Source(#[from] anyhow::Error),
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Io(_) => ErrorCategory::Transport,
            ClientError::Connect { .. } | ClientError::BatchDelivery { .. } => {
                ErrorCategory::Exhausted
            }
            ClientError::Decode(_)
            | ClientError::UnexpectedResponse { .. }
            | ClientError::Validation(_)
            | ClientError::Source(_) => ErrorCategory::Protocol,
        }
    }

    /// I/O failures, including a dial that ran out of attempts
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::Connect { .. })
    }

    /// Whether a whole batch attempt may be repeated after this error
    ///
    /// Transport failures and undecodable answers both qualify; the next
    /// attempt starts a fresh dial budget.
    pub fn is_batch_retryable(&self) -> bool {
        self.is_transient()
            || matches!(
                self,
                ClientError::Decode(_) | ClientError::UnexpectedResponse { .. }
            )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
