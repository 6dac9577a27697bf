//! Codec error types.

use siridb_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by the framing layer.
///
/// Every variant except [`CodecError::Io`] with a recoverable kind is
/// terminal for the connection that produced it.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A header failed validation; the stream cannot be resynchronized.
    #[error("invalid package: {0}")]
    InvalidPackage(#[from] ProtocolError),

    /// Growing the stream buffer failed.
    #[error("failed to allocate {requested} bytes for the stream buffer")]
    Allocation {
        /// Capacity that could not be reserved.
        requested: usize,
    },

    /// The buffer was closed after a framing violation.
    #[error("stream buffer closed after a framing violation")]
    Closed,

    /// IO error from the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Whether this error is a framing violation.
    #[must_use]
    pub fn is_framing(&self) -> bool {
        matches!(self, Self::InvalidPackage(_) | Self::Closed)
    }
}
