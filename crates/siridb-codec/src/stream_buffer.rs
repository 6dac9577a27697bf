//! Stream reassembly buffer.
//!
//! [`StreamBuffer`] owns the bytes received on one connection and slices
//! complete packages out of them. The buffer keeps the invariant that
//! `storage[..len]` holds zero or more complete packages followed by at most
//! one partial package, with the next header always at offset zero.
//!
//! Reads can go through [`StreamBuffer::append`] (copy a received chunk) or
//! through the zero-copy pair [`StreamBuffer::read_slot`] /
//! [`StreamBuffer::commit`], where the transport writes directly into the
//! buffer's spare capacity.
//!
//! Growth is fallible: an allocation failure surfaces as
//! [`CodecError::Allocation`] instead of aborting the process.

use bytes::Bytes;
use siridb_protocol::{DEFAULT_MAX_PACKAGE_SIZE, PACKAGE_HEADER_SIZE, PackageHeader};

use crate::error::CodecError;
use crate::package::Package;

/// Default suggested allocation size for a single read.
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

/// Buffer for accumulating stream deliveries and extracting packages.
#[derive(Debug)]
pub struct StreamBuffer {
    /// Backing storage; `storage.len()` is the capacity in use.
    storage: Vec<u8>,
    /// Write cursor: number of buffered bytes.
    len: usize,
    /// Suggested allocation size when no partial package is buffered.
    read_size: usize,
    /// Maximum accepted payload length.
    max_package_size: usize,
    /// Set after a framing violation; no package is produced afterwards.
    closed: bool,
}

impl StreamBuffer {
    /// Create a buffer with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_PACKAGE_SIZE, DEFAULT_READ_SIZE)
    }

    /// Create a buffer with a custom maximum payload and read size.
    ///
    /// The read size is raised to at least one header so a read slot is never
    /// empty.
    #[must_use]
    pub fn with_limits(max_package_size: usize, read_size: usize) -> Self {
        Self {
            storage: Vec::new(),
            len: 0,
            read_size: read_size.max(PACKAGE_HEADER_SIZE),
            max_package_size,
            closed: false,
        }
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current capacity of the storage.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The buffered bytes.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Whether the buffer was closed after a framing violation.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Maximum accepted payload length.
    #[must_use]
    pub fn max_package_size(&self) -> usize {
        self.max_package_size
    }

    /// Copy a received chunk into the buffer and extract complete packages.
    ///
    /// The returned iterator must be drained before the next call; packages
    /// left in it stay buffered and are produced by the next iterator.
    pub fn append(&mut self, chunk: &[u8]) -> Result<Frames<'_>, CodecError> {
        let slot = self.prepare(chunk.len().max(self.read_size), chunk.len())?;
        slot[..chunk.len()].copy_from_slice(chunk);
        Ok(self.commit(chunk.len()))
    }

    /// Spare capacity for the next read.
    ///
    /// When no partial package is buffered and the capacity differs from the
    /// suggested read size, the storage is replaced by a fresh allocation of
    /// exactly that size. The slot is never empty.
    pub fn read_slot(&mut self) -> Result<&mut [u8], CodecError> {
        self.prepare(self.read_size, 1)
    }

    /// Account for `n` bytes written into the last [`read_slot`] and extract
    /// complete packages.
    ///
    /// [`read_slot`]: Self::read_slot
    pub fn commit(&mut self, n: usize) -> Frames<'_> {
        self.len = (self.len + n).min(self.storage.len());
        Frames { buffer: self }
    }

    /// Grow the storage to hold at least `total` bytes, preserving contents.
    pub fn reserve(&mut self, total: usize) -> Result<(), CodecError> {
        if self.storage.len() >= total {
            return Ok(());
        }
        let additional = total - self.storage.len();
        self.storage
            .try_reserve_exact(additional)
            .map_err(|_| CodecError::Allocation { requested: total })?;
        self.storage.resize(total, 0);
        Ok(())
    }

    /// Drop the first `consumed` bytes and shift the remainder to offset zero.
    pub fn compact(&mut self, consumed: usize) {
        let consumed = consumed.min(self.len);
        self.storage.copy_within(consumed..self.len, 0);
        self.len -= consumed;
    }

    /// Discard all buffered bytes and release the storage.
    pub fn clear(&mut self) {
        self.storage = Vec::new();
        self.len = 0;
    }

    /// Ensure a writable slot of at least `min_free` bytes after the cursor.
    fn prepare(&mut self, suggested: usize, min_free: usize) -> Result<&mut [u8], CodecError> {
        if self.closed {
            return Err(CodecError::Closed);
        }

        if self.len == 0 && self.storage.len() != suggested {
            let mut fresh = Vec::new();
            if fresh.try_reserve_exact(suggested).is_err() {
                self.fail();
                return Err(CodecError::Allocation {
                    requested: suggested,
                });
            }
            fresh.resize(suggested, 0);
            self.storage = fresh;
        }

        let needed = self.len + min_free;
        if self.storage.len() < needed {
            // Grow by at least one read so small chunks don't reallocate each time.
            let target = needed.max(self.len + self.read_size);
            if let Err(e) = self.reserve(target) {
                self.fail();
                return Err(e);
            }
        }

        Ok(&mut self.storage[self.len..])
    }

    /// Try to slice one complete package off the front of the buffer.
    fn extract_one(&mut self) -> Option<Result<Package, CodecError>> {
        if self.closed {
            return None;
        }

        let header = PackageHeader::peek(&self.storage[..self.len])?;

        if let Err(e) = header.validate(self.max_package_size) {
            tracing::warn!(
                pid = header.pid,
                tp = header.tp,
                len = header.length,
                error = %e,
                "invalid package header, discarding stream buffer"
            );
            self.fail();
            return Some(Err(CodecError::InvalidPackage(e)));
        }

        let total = header.total_size();
        if self.len < total {
            if let Err(e) = self.reserve(total) {
                self.fail();
                return Some(Err(e));
            }
            return None;
        }

        let frame = Bytes::copy_from_slice(&self.storage[..total]);
        self.compact(total);

        tracing::trace!(
            pid = header.pid,
            tp = header.tp,
            len = header.length,
            remaining = self.len,
            "extracted package"
        );

        Some(Ok(Package::from_parts(header, frame)))
    }

    fn fail(&mut self) {
        self.closed = true;
        self.clear();
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the packages completed by one delivery.
///
/// Yields packages in arrival order. A framing violation or allocation
/// failure is yielded once as an error, after which the iterator and the
/// buffer stop producing packages for good.
#[derive(Debug)]
pub struct Frames<'a> {
    buffer: &'a mut StreamBuffer,
}

impl Iterator for Frames<'_> {
    type Item = Result<Package, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.extract_one()
    }
}
