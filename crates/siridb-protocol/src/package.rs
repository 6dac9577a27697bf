//! Package header definitions.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Package header size in bytes.
pub const PACKAGE_HEADER_SIZE: usize = 8;

/// Default upper bound for a package payload (200 MiB).
pub const DEFAULT_MAX_PACKAGE_SIZE: usize = 209_715_200;

/// Package header.
///
/// Every package begins with an 8-byte little-endian header describing the
/// payload length, the correlation id and the type of the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageHeader {
    /// Payload length, excluding the header.
    pub length: u32,
    /// Correlation id shared by a request and its response.
    pub pid: u16,
    /// Type tag (see [`RequestType`](crate::RequestType) and
    /// [`ResponseType`](crate::ResponseType)).
    pub tp: u8,
    /// Check byte, valid when it equals `!tp`.
    pub check: u8,
}

impl PackageHeader {
    /// Create a header with a correct check byte.
    #[must_use]
    pub const fn new(pid: u16, tp: u8, length: u32) -> Self {
        Self {
            length,
            pid,
            tp,
            check: !tp,
        }
    }

    /// Parse a header from bytes.
    ///
    /// This only reads the fields; use [`validate`](Self::validate) to check
    /// the marker and the length bound.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if src.remaining() < PACKAGE_HEADER_SIZE {
            return Err(ProtocolError::IncompleteHeader {
                expected: PACKAGE_HEADER_SIZE,
                actual: src.remaining(),
            });
        }

        Ok(Self {
            length: src.get_u32_le(),
            pid: src.get_u16_le(),
            tp: src.get_u8(),
            check: src.get_u8(),
        })
    }

    /// Read the header at the start of `src` without consuming anything.
    ///
    /// Returns `None` when fewer than [`PACKAGE_HEADER_SIZE`] bytes are
    /// available.
    #[must_use]
    pub fn peek(src: &[u8]) -> Option<Self> {
        let mut cursor = src.get(..PACKAGE_HEADER_SIZE)?;
        Self::decode(&mut cursor).ok()
    }

    /// Encode the header.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.length);
        dst.put_u16_le(self.pid);
        dst.put_u8(self.tp);
        dst.put_u8(self.check);
    }

    /// Encode the header to a new `Bytes` buffer.
    #[must_use]
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKAGE_HEADER_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Check the validity marker.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.tp == !self.check
    }

    /// Check the validity marker and the payload length bound.
    ///
    /// A length exactly equal to `max_payload` is accepted.
    pub fn validate(&self, max_payload: usize) -> Result<(), ProtocolError> {
        if !self.is_valid() {
            return Err(ProtocolError::InvalidCheckBit {
                tp: self.tp,
                check: self.check,
            });
        }
        if self.payload_length() > max_payload {
            return Err(ProtocolError::PackageTooLarge {
                size: self.payload_length(),
                max: max_payload,
            });
        }
        Ok(())
    }

    /// Payload length as `usize`.
    #[must_use]
    pub const fn payload_length(&self) -> usize {
        self.length as usize
    }

    /// Header plus payload length.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        PACKAGE_HEADER_SIZE + self.length as usize
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_roundtrip() {
        let header = PackageHeader::new(513, 2, 100);

        let bytes = header.encode_to_bytes();
        assert_eq!(bytes.len(), PACKAGE_HEADER_SIZE);
        assert_eq!(&bytes[..], &[100, 0, 0, 0, 1, 2, 2, 0xFD]);

        let mut cursor = bytes.as_ref();
        let decoded = PackageHeader::decode(&mut cursor).unwrap();
        assert_eq!(header, decoded);
        assert!(decoded.is_valid());
    }

    #[test]
    fn test_peek_short_input() {
        assert!(PackageHeader::peek(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_invalid_check_bit() {
        let mut header = PackageHeader::new(1, 0, 4);
        header.check = 0;
        assert!(!header.is_valid());
        assert_eq!(
            header.validate(DEFAULT_MAX_PACKAGE_SIZE),
            Err(ProtocolError::InvalidCheckBit { tp: 0, check: 0 })
        );
    }

    #[test]
    fn test_max_length_boundary() {
        let at_max = PackageHeader::new(1, 0, 1024);
        assert!(at_max.validate(1024).is_ok());

        let over_max = PackageHeader::new(1, 0, 1025);
        assert_eq!(
            over_max.validate(1024),
            Err(ProtocolError::PackageTooLarge {
                size: 1025,
                max: 1024
            })
        );
    }

    #[test]
    fn test_total_size() {
        let header = PackageHeader::new(0, 0, 92);
        assert_eq!(header.total_size(), 100);
    }

    proptest! {
        #[test]
        fn constructed_headers_are_valid(pid: u16, tp: u8, length: u32) {
            let header = PackageHeader::new(pid, tp, length);
            prop_assert!(header.is_valid());
            prop_assert_eq!(PackageHeader::peek(&header.encode_to_bytes()), Some(header));
        }

        #[test]
        fn corrupted_check_is_rejected(tp: u8, check: u8) {
            prop_assume!(check != !tp);
            let header = PackageHeader { length: 0, pid: 0, tp, check };
            prop_assert!(header.validate(DEFAULT_MAX_PACKAGE_SIZE).is_err());
        }
    }
}
