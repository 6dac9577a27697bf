//! Split I/O transport with stream reassembly.
//!
//! The stream is split into a read half, which reads straight into a
//! [`StreamBuffer`], and a write half wrapped in a [`PackageWriter`]. The
//! read side is cancellation safe: a read interrupted before completion
//! commits nothing, so it can sit in a `select!` next to other work.

use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf, WriteHalf};

use crate::error::CodecError;
use crate::framed::PackageWriter;
use crate::package::{Package, PackageCodec};
use crate::stream_buffer::{DEFAULT_READ_SIZE, Frames, StreamBuffer};

/// A package transport over a byte stream.
///
/// # Example
///
/// ```rust,ignore
/// use siridb_codec::Transport;
/// use tokio::net::TcpStream;
///
/// let stream = TcpStream::connect("localhost:9000").await?;
/// let mut transport = Transport::new(stream);
///
/// transport.send(package).await?;
/// let n = transport.read_chunk().await?;
/// for package in transport.frames(n) {
///     let package = package?;
/// }
/// ```
pub struct Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    reader: ReadHalf<T>,
    writer: PackageWriter<WriteHalf<T>>,
    buffer: StreamBuffer,
}

impl<T> Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Create a transport with default limits.
    pub fn new(transport: T) -> Self {
        Self::with_limits(
            transport,
            siridb_protocol::DEFAULT_MAX_PACKAGE_SIZE,
            DEFAULT_READ_SIZE,
        )
    }

    /// Create a transport with a maximum payload size and a suggested read
    /// size.
    pub fn with_limits(transport: T, max_package_size: usize, read_size: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(transport);
        let codec = PackageCodec::new().with_max_package_size(max_package_size);

        Self {
            reader: read_half,
            writer: PackageWriter::with_codec(write_half, codec),
            buffer: StreamBuffer::with_limits(max_package_size, read_size),
        }
    }

    /// Read the next delivery into the stream buffer.
    ///
    /// Returns the number of bytes read; `0` means the peer closed the
    /// stream. Pass the count to [`frames`](Self::frames) to extract the
    /// packages it completed.
    pub async fn read_chunk(&mut self) -> Result<usize, CodecError> {
        let slot = self.buffer.read_slot()?;
        let n = self.reader.read(slot).await?;
        Ok(n)
    }

    /// Commit `n` freshly read bytes and iterate over completed packages.
    pub fn frames(&mut self, n: usize) -> Frames<'_> {
        self.buffer.commit(n)
    }

    /// Write and flush one package.
    pub async fn send(&mut self, package: Package) -> Result<(), CodecError> {
        self.writer.send(package).await
    }

    /// Flush and shut down the write half.
    pub async fn shutdown(&mut self) -> Result<(), CodecError> {
        self.writer.close().await
    }

    /// The reassembly buffer.
    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }
}

impl<T> std::fmt::Debug for Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("buffered", &self.buffer.len())
            .field("closed", &self.buffer.is_closed())
            .finish_non_exhaustive()
    }
}
