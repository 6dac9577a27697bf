//! # siridb-codec
//!
//! Async framing layer for SiriDB packages.
//!
//! This crate turns a raw byte stream into discrete packages. TCP delivers
//! bytes without message boundaries: a single read may hold half a header,
//! several packages, or the tail of one package and the head of the next.
//! [`StreamBuffer`] accumulates those deliveries and slices complete
//! packages out of them in arrival order.
//!
//! ## Architecture
//!
//! ```text
//! TCP Stream → Transport (split I/O) → StreamBuffer (reassembly) → Client
//!                                   ← PackageWriter (PackageCodec) ←
//! ```
//!
//! A framing violation (bad check bit or an oversized length) is fatal:
//! a length-prefixed stream offers no point to resynchronize, so the buffer
//! refuses to produce any further package.
//!
//! ```rust
//! use siridb_codec::{Package, StreamBuffer};
//!
//! let mut buffer = StreamBuffer::new();
//! let wire = Package::new(1, 0, b"show".as_slice()).into_frame();
//!
//! // Deliver the package in two pieces.
//! assert_eq!(buffer.append(&wire[..5]).unwrap().count(), 0);
//! let packages: Vec<_> = buffer.append(&wire[5..]).unwrap().collect();
//! assert_eq!(packages.len(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod framed;
pub mod package;
pub mod stream_buffer;
pub mod transport;

pub use error::CodecError;
pub use framed::{PackageStream, PackageWriter};
pub use package::{Package, PackageCodec};
pub use stream_buffer::{DEFAULT_READ_SIZE, Frames, StreamBuffer};
pub use transport::Transport;
