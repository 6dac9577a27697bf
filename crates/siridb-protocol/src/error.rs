//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while interpreting package headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not enough bytes to hold a complete header.
    #[error("incomplete package header: expected {expected} bytes, got {actual}")]
    IncompleteHeader {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// The check byte is not the complement of the type tag.
    #[error("invalid package check bit (tp {tp}, check {check})")]
    InvalidCheckBit {
        /// Type tag found in the header.
        tp: u8,
        /// Check byte found in the header.
        check: u8,
    },

    /// The declared payload length exceeds the configured maximum.
    #[error("package too large: {size} bytes (max {max})")]
    PackageTooLarge {
        /// Declared payload length.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Type tag is not a known request type.
    #[error("unknown request type: {0}")]
    UnknownRequestType(u8),

    /// Type tag is not a known response type.
    #[error("unknown response type: {0}")]
    UnknownResponseType(u8),
}
