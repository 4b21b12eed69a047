//! Unified error types for the bootloader link.
//!
//! Each layer owns a small enum; everything funnels into the top-level
//! [`Error`] so call sites can match exhaustively on what is retryable
//! and what is fatal instead of catching blindly.

use std::fmt;
use std::io;

use crate::rpc::codec::{MessageType, ResponseCode};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// The byte channel failed (read, write, or timeout).
    Transport(TransportError),
    /// A reply could not be decoded.
    Decode(DecodeError),
    /// A reply decoded cleanly but violated the protocol.
    Protocol(ProtocolError),
    /// The page transfer hit a fatal condition.
    Flash(FlashError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Flash(e) => Some(e),
        }
    }
}

impl Error {
    /// Whether the chunk-write retry loop may recover from this error.
    ///
    /// Transport, decode, and protocol failures are all manifestations of
    /// transient link corruption; flash-level failures are always fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Decode(_) | Self::Protocol(_) => true,
            Self::Flash(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Byte-channel failures.
#[derive(Debug)]
pub enum TransportError {
    /// Underlying device I/O failed.
    Io(io::Error),
    /// No complete reply frame arrived within the read deadline.
    Timeout,
    /// A frame length prefix exceeded the configured maximum.
    FrameTooLarge(usize),
    /// The channel returned end-of-stream.
    Disconnected,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Timeout => write!(f, "timed out waiting for reply frame"),
            Self::FrameTooLarge(n) => write!(f, "frame length {n} exceeds maximum"),
            Self::Disconnected => write!(f, "channel disconnected"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::TimedOut {
            Self::Timeout
        } else {
            Self::Io(e)
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Wire-codec failures while reading a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A read needed more bytes than the buffer held.
    TruncatedBuffer { needed: usize, remaining: usize },
    /// A string field held malformed UTF-8.
    InvalidEncoding,
    /// The header carried a codec version this implementation does not speak.
    UnsupportedVersion(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedBuffer { needed, remaining } => {
                write!(f, "truncated buffer: needed {needed} bytes, {remaining} remain")
            }
            Self::InvalidEncoding => write!(f, "string field is not valid UTF-8"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported codec version {v}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Violations of the request/response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The reply's message type was not a single normal reply.
    UnexpectedMessageType(MessageType),
    /// The reply's sequence did not match the request's.
    SequenceMismatch { sent: u8, received: u8 },
    /// The reply's protocol field carried a defined error code.
    RemoteError(ResponseCode),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedMessageType(t) => write!(f, "unexpected reply message type {t:?}"),
            Self::SequenceMismatch { sent, received } => {
                write!(f, "sequence mismatch: sent {sent}, reply carried {received}")
            }
            Self::RemoteError(code) => write!(f, "remote error: {code}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Flash transfer errors
// ---------------------------------------------------------------------------

/// Fatal page-transfer failures. The target must be assumed inconsistent;
/// a caller must not resume a partial transfer after any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// The target could not be pinged before the transfer.
    NoLink,
    /// Application region erase reported a nonzero status.
    EraseFailed { status: i8 },
    /// A chunk write failed on every allowed attempt.
    RetryBudgetExceeded { page: usize, offset: usize },
    /// Page commit reported a nonzero status.
    CommitFailed { page: usize, status: i8 },
    /// Setting the boot target reported a nonzero status.
    BootFailed { status: i8 },
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLink => write!(f, "no response to ping; link not established"),
            Self::EraseFailed { status } => {
                write!(f, "application region erase failed with status {status}")
            }
            Self::RetryBudgetExceeded { page, offset } => {
                write!(f, "chunk write at page {page} offset {offset:#x} exhausted retries")
            }
            Self::CommitFailed { page, status } => {
                write!(f, "commit of page {page} failed with status {status}")
            }
            Self::BootFailed { status } => {
                write!(f, "set boot action failed with status {status}")
            }
        }
    }
}

impl std::error::Error for FlashError {}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsystem_errors_are_std_errors() {
        // Each enum must satisfy Error + Send + Sync so anyhow context
        // can attach to it at the CLI boundary.
        fn assert_std_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}

        assert_std_error(&TransportError::Timeout);
        assert_std_error(&DecodeError::InvalidEncoding);
        assert_std_error(&ProtocolError::RemoteError(ResponseCode::NoServer));
        assert_std_error(&FlashError::NoLink);
        assert_std_error(&Error::Flash(FlashError::NoLink));
    }

    #[test]
    fn io_failure_is_reachable_through_the_source_chain() {
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::Transport(TransportError::Io(io));

        let transport = std::error::Error::source(&err).unwrap();
        let inner = transport.source().unwrap();
        assert_eq!(
            inner.downcast_ref::<io::Error>().unwrap().kind(),
            io::ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn anyhow_context_attaches_to_transport_errors() {
        use anyhow::Context;

        let failing: std::result::Result<(), TransportError> = Err(TransportError::Timeout);
        let err = failing.context("opening serial device").unwrap_err();
        assert!(err.to_string().contains("opening serial device"));
        assert!(format!("{:#}", err).contains("timed out"));
    }
}
