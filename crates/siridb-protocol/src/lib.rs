//! # siridb-protocol
//!
//! Package framing for the SiriDB client protocol.
//!
//! Every message exchanged with a SiriDB server is a *package*: an 8-byte
//! header followed by an opaque payload. The header carries the payload
//! length, the correlation id (`pid`) that links a response to its request,
//! a type tag, and a check byte that must equal the bitwise complement of the
//! type tag.
//!
//! ```text
//! +----------+--------+------+----------+----------------+
//! | len: u32 | pid:u16| tp:u8| check:u8 | payload (len)  |
//! +----------+--------+------+----------+----------------+
//!   little endian
//! ```
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no networking logic
//! and does not know how payloads are encoded. Higher-level crates build the
//! stream reassembly and request correlation on top of it.
//!
//! ## Example
//!
//! ```rust
//! use siridb_protocol::{PackageHeader, RequestType, PACKAGE_HEADER_SIZE};
//!
//! let header = PackageHeader::new(7, RequestType::Query.into(), 12);
//! assert!(header.is_valid());
//!
//! let bytes = header.encode_to_bytes();
//! assert_eq!(bytes.len(), PACKAGE_HEADER_SIZE);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod package;
pub mod types;

pub use error::ProtocolError;
pub use package::{DEFAULT_MAX_PACKAGE_SIZE, PACKAGE_HEADER_SIZE, PackageHeader};
pub use types::{RequestType, ResponseType, errproto};
