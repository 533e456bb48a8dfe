//! Error types for the scpi-link library.
//!
//! Two families matter to callers:
//!
//! - [`Error::Transport`] means the link is unusable and may need to be
//!   re-established.
//! - [`Error::Scpi`] means the link is fine but the instrument reported that it
//!   could not execute a command.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::types::ScpiEvent;

/// The main error type for scpi-link operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Link-level failure (open, connect, read, write, close).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error reported by the instrument through its error queue.
    #[error("SCPI error {}: {}", .0.code, .0.description)]
    Scpi(ScpiEvent),

    /// A response could not be decoded into the requested type.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Discovery could not be started or configured.
    #[error("discovery error: {message}")]
    Discovery { message: String },
}

impl Error {
    /// Returns true if this error means the connection may need to be reopened.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns the device-reported event, if this is an SCPI error.
    #[must_use]
    pub const fn scpi_event(&self) -> Option<&ScpiEvent> {
        match self {
            Self::Scpi(event) => Some(event),
            _ => None,
        }
    }
}

/// Classification of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The peer refused the connection or nothing is listening.
    ConnectionRefused,
    /// A connect or read did not complete within the configured timeout.
    Timeout,
    /// The address, hostname or device path is malformed or does not exist.
    AddressInvalid,
    /// The OS denied access, or the device is held by another process.
    PermissionDenied,
    /// The transport has already been closed.
    NotOpen,
    /// The peer closed the stream.
    ConnectionClosed,
    /// Any other OS or library failure.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectionRefused => "connection refused",
            Self::Timeout => "timed out",
            Self::AddressInvalid => "invalid address",
            Self::PermissionDenied => "permission denied",
            Self::NotOpen => "not open",
            Self::ConnectionClosed => "connection closed",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A link-level failure, normalized from whatever the OS or library reported.
///
/// The original error text is kept in `message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// What went wrong.
    pub kind: TransportErrorKind,
    /// The underlying error message.
    pub message: String,
}

impl TransportError {
    /// Creates a new transport error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error returned by operations on a closed transport.
    #[must_use]
    pub fn not_open() -> Self {
        Self::new(TransportErrorKind::NotOpen, "transport is closed")
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
            io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy => {
                TransportErrorKind::PermissionDenied
            }
            io::ErrorKind::NotFound
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::AddrNotAvailable => TransportErrorKind::AddressInvalid,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportErrorKind::ConnectionClosed,
            _ => TransportErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<tokio_serial::Error> for TransportError {
    fn from(err: tokio_serial::Error) -> Self {
        let kind = match err.kind() {
            tokio_serial::ErrorKind::NoDevice | tokio_serial::ErrorKind::InvalidInput => {
                TransportErrorKind::AddressInvalid
            }
            tokio_serial::ErrorKind::Io(io_kind) => {
                return Self::from(io::Error::new(io_kind, err.description));
            }
            tokio_serial::ErrorKind::Unknown => TransportErrorKind::Other,
        };
        Self::new(kind, err.description)
    }
}

/// Errors decoding SCPI response data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Response is not valid for the expected type.
    #[error("invalid {expected} response: {data:?}")]
    Invalid {
        expected: &'static str,
        data: String,
    },

    /// Arbitrary block header is malformed.
    #[error("malformed block header: {0}")]
    BlockHeader(String),

    /// Arbitrary block is shorter than its header announces.
    #[error("incomplete block: expected {expected} bytes, got {got}")]
    IncompleteBlock { expected: usize, got: usize },
}

impl ParseError {
    pub(crate) fn invalid(expected: &'static str, data: &[u8]) -> Self {
        Self::Invalid {
            expected,
            data: String::from_utf8_lossy(data).into_owned(),
        }
    }
}

/// Result type alias for scpi-link operations.
pub type Result<T> = std::result::Result<T, Error>;
