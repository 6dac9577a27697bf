//! Client error types and the numeric status vocabulary.
//!
//! Every completion carries either a [`Response`](crate::Response) or an
//! [`Error`]. Errors are `Clone` so a single teardown can deliver the same
//! failure to every outstanding request; I/O errors are captured as their
//! kind plus message for that reason.

use std::fmt;
use std::io;

use siridb_codec::CodecError;
use siridb_protocol::ProtocolError;
use thiserror::Error;

use crate::pending::WriteState;

/// Errors that can complete a request or reject a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No live connection to send on.
    #[error("not connected")]
    NotConnected,

    /// The connection was closed while the request was outstanding.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Transport failure while connecting, reading or writing.
    #[error("transport error: {message}")]
    Transport {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// Message of the underlying I/O error.
        message: String,
    },

    /// Connection establishment exceeded the configured timeout.
    #[error("connection timed out")]
    ConnectionTimeout,

    /// A package header failed validation.
    #[error("invalid package: {0}")]
    InvalidPackage(#[from] ProtocolError),

    /// Growing a buffer failed.
    #[error("failed to allocate {requested} bytes")]
    Allocation {
        /// Capacity that could not be reserved.
        requested: usize,
    },

    /// The codec could not encode a payload.
    #[error("encode error: {0}")]
    Encode(String),

    /// The codec could not decode a payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// The call is not valid in the current state.
    #[error("misuse: {0}")]
    Misuse(#[from] Misuse),

    /// The request was dropped before it completed, either unsubmitted or
    /// while its driver was torn down without a close.
    #[error("request dropped before completion")]
    Abandoned,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Caller misuse, rejected deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Misuse {
    /// Query or insert submitted before the handshake succeeded.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Connect while a connection is already live.
    #[error("already connected")]
    AlreadyConnected,

    /// A request with this correlation id is already outstanding.
    #[error("duplicate package id {0}")]
    DuplicatePid(u16),

    /// A pending write was driven through an invalid transition.
    #[error("invalid write transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: WriteState,
        /// Requested state.
        to: WriteState,
    },

    /// No tokio runtime to run the connection on.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl Error {
    /// Numeric status of this error.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::NotConnected => Status::NotConnected,
            Self::ConnectionClosed(_) => Status::ConnectionClosed,
            Self::Transport { kind, .. } => match kind {
                io::ErrorKind::ConnectionRefused => Status::ConnectionRefused,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => Status::ConnectionReset,
                io::ErrorKind::TimedOut => Status::TimedOut,
                io::ErrorKind::UnexpectedEof => Status::ConnectionClosed,
                _ => Status::Transport,
            },
            Self::ConnectionTimeout => Status::TimedOut,
            Self::InvalidPackage(_) => Status::InvalidPackage,
            Self::Allocation { .. } => Status::Allocation,
            Self::Encode(_) => Status::Encode,
            Self::Decode(_) => Status::Decode,
            Self::Misuse(_) => Status::Misuse,
            Self::Abandoned => Status::Abandoned,
            Self::Config(_) => Status::Config,
        }
    }

    /// Check if this error is transient and may succeed on retry.
    ///
    /// Transient errors are those tied to the connection rather than to the
    /// request itself. The connector never retries on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionClosed(_)
                | Self::Transport { .. }
                | Self::ConnectionTimeout
        )
    }

    /// Check if this error is caller misuse.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::Misuse(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Transport {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidPackage(e) => Self::InvalidPackage(e),
            CodecError::Allocation { requested } => Self::Allocation { requested },
            CodecError::Closed => Self::ConnectionClosed(INVALID_PACKAGE_CLOSE.to_string()),
            CodecError::Io(e) => Self::from(e),
        }
    }
}

/// Close reason used after a framing violation.
pub(crate) const INVALID_PACKAGE_CLOSE: &str = "invalid package, connection closed";

/// Numeric status codes.
///
/// Codes are stable and can be turned back into a message with
/// [`strerror`] without holding an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Success.
    Ok = 0,
    /// No live connection.
    NotConnected = -1,
    /// Connection closed.
    ConnectionClosed = -2,
    /// Peer refused the connection.
    ConnectionRefused = -3,
    /// Connection reset by peer.
    ConnectionReset = -4,
    /// Operation timed out.
    TimedOut = -5,
    /// Other transport failure.
    Transport = -6,
    /// Framing violation.
    InvalidPackage = -7,
    /// Allocation failure.
    Allocation = -8,
    /// Payload encoding failed.
    Encode = -9,
    /// Payload decoding failed.
    Decode = -10,
    /// Caller misuse.
    Misuse = -11,
    /// Request dropped before completion.
    Abandoned = -12,
    /// Invalid configuration.
    Config = -13,
}

impl Status {
    const ALL: [Self; 14] = [
        Self::Ok,
        Self::NotConnected,
        Self::ConnectionClosed,
        Self::ConnectionRefused,
        Self::ConnectionReset,
        Self::TimedOut,
        Self::Transport,
        Self::InvalidPackage,
        Self::Allocation,
        Self::Encode,
        Self::Decode,
        Self::Misuse,
        Self::Abandoned,
        Self::Config,
    ];

    /// Numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up a status by its numeric code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::NotConnected => "not connected",
            Self::ConnectionClosed => "connection closed",
            Self::ConnectionRefused => "connection refused",
            Self::ConnectionReset => "connection reset by peer",
            Self::TimedOut => "operation timed out",
            Self::Transport => "transport error",
            Self::InvalidPackage => "invalid package",
            Self::Allocation => "memory allocation error",
            Self::Encode => "error encoding payload",
            Self::Decode => "error decoding payload",
            Self::Misuse => "operation not allowed in the current state",
            Self::Abandoned => "request dropped before completion",
            Self::Config => "invalid configuration",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Describe a numeric status code.
#[must_use]
pub fn strerror(code: i32) -> &'static str {
    Status::from_code(code).map_or("unknown error", Status::message)
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
