//! Shared error type across wsRelay crates.

use std::time::Duration;

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
    /// The supervising (or producer) cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// A single transport write did not finish within its deadline.
    #[error("write timed out after {}ms", .0.as_millis())]
    WriteTimeout(Duration),
    #[error("transport: {0}")]
    Transport(String),
    #[error("mailbox full")]
    MailboxFull,
    #[error("mailbox closed")]
    MailboxClosed,
    #[error("delivery loop already running")]
    LoopRunning,
    #[error("delivery loop already finished")]
    LoopFinished,
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable short code, used for metric labels and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "BAD_REQUEST",
            RelayError::UnsupportedVersion => "UNSUPPORTED_VERSION",
            RelayError::Encode(_) => "ENCODE",
            RelayError::Decode(_) => "DECODE",
            RelayError::Cancelled => "CANCELLED",
            RelayError::WriteTimeout(_) => "WRITE_TIMEOUT",
            RelayError::Transport(_) => "TRANSPORT",
            RelayError::MailboxFull => "MAILBOX_FULL",
            RelayError::MailboxClosed => "MAILBOX_CLOSED",
            RelayError::LoopRunning => "LOOP_RUNNING",
            RelayError::LoopFinished => "LOOP_FINISHED",
            RelayError::Internal(_) => "INTERNAL",
        }
    }

    /// True when the operation ended because someone asked it to stop,
    /// not because the peer or the transport misbehaved.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RelayError::Cancelled | RelayError::MailboxClosed)
    }

    /// True for failures that make further writes on the connection pointless.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, RelayError::WriteTimeout(_) | RelayError::Transport(_))
    }
}
