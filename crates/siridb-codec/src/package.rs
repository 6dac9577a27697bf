//! Package type and tokio-util codec.

use bytes::{BufMut, Bytes, BytesMut};
use siridb_protocol::{DEFAULT_MAX_PACKAGE_SIZE, PACKAGE_HEADER_SIZE, PackageHeader, ProtocolError};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// A complete package: header plus payload, stored as one contiguous frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    header: PackageHeader,
    frame: Bytes,
}

impl Package {
    /// Build a package from a correlation id, a type tag and a payload.
    #[must_use]
    pub fn new(pid: u16, tp: u8, payload: impl AsRef<[u8]>) -> Self {
        let payload = payload.as_ref();
        let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        let header = PackageHeader::new(pid, tp, length);

        let mut frame = BytesMut::with_capacity(PACKAGE_HEADER_SIZE + payload.len());
        header.encode(&mut frame);
        frame.put_slice(payload);

        Self {
            header,
            frame: frame.freeze(),
        }
    }

    /// Parse a complete frame (header and payload).
    ///
    /// The frame length must match the declared payload length exactly.
    pub fn from_frame(frame: Bytes) -> Result<Self, ProtocolError> {
        let header = PackageHeader::decode(&mut frame.as_ref())?;
        if frame.len() != header.total_size() {
            return Err(ProtocolError::IncompleteHeader {
                expected: header.total_size(),
                actual: frame.len(),
            });
        }
        Ok(Self { header, frame })
    }

    /// Assemble a package from an already parsed header and its frame.
    pub(crate) fn from_parts(header: PackageHeader, frame: Bytes) -> Self {
        debug_assert_eq!(frame.len(), header.total_size());
        Self { header, frame }
    }

    /// Package header.
    #[must_use]
    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Correlation id.
    #[must_use]
    pub fn pid(&self) -> u16 {
        self.header.pid
    }

    /// Type tag.
    #[must_use]
    pub fn tp(&self) -> u8 {
        self.header.tp
    }

    /// Payload bytes, excluding the header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.frame[PACKAGE_HEADER_SIZE..]
    }

    /// Payload as a cheaply cloneable buffer.
    #[must_use]
    pub fn payload_bytes(&self) -> Bytes {
        self.frame.slice(PACKAGE_HEADER_SIZE..)
    }

    /// The complete wire frame.
    #[must_use]
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    /// Consume the package, returning the wire frame.
    #[must_use]
    pub fn into_frame(self) -> Bytes {
        self.frame
    }

    /// Total size including the header.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.frame.len()
    }
}

/// Package codec for tokio-util framing.
///
/// Decoding applies the same validation as [`StreamBuffer`]: a header with a
/// bad check bit or an oversized length is reported as
/// [`CodecError::InvalidPackage`].
///
/// [`StreamBuffer`]: crate::StreamBuffer
#[derive(Debug, Clone)]
pub struct PackageCodec {
    /// Maximum payload size to accept or emit.
    max_package_size: usize,
}

impl PackageCodec {
    /// Create a new codec with the default maximum package size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_package_size: DEFAULT_MAX_PACKAGE_SIZE,
        }
    }

    /// Set the maximum payload size.
    #[must_use]
    pub fn with_max_package_size(mut self, size: usize) -> Self {
        self.max_package_size = size;
        self
    }

    /// Maximum payload size.
    #[must_use]
    pub fn max_package_size(&self) -> usize {
        self.max_package_size
    }
}

impl Default for PackageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PackageCodec {
    type Item = Package;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(header) = PackageHeader::peek(src) else {
            return Ok(None);
        };
        header.validate(self.max_package_size)?;

        let total = header.total_size();
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total).freeze();

        tracing::trace!(
            pid = header.pid,
            tp = header.tp,
            len = header.length,
            "decoded package"
        );

        Ok(Some(Package::from_parts(header, frame)))
    }
}

impl Encoder<Package> for PackageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Package, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.header().validate(self.max_package_size)?;

        dst.reserve(item.total_size());
        dst.put_slice(item.frame());

        tracing::trace!(
            pid = item.pid(),
            tp = item.tp(),
            len = item.header().length,
            "encoded package"
        );

        Ok(())
    }
}
