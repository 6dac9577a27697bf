#![no_main]

use libfuzzer_sys::fuzz_target;
use siridb_protocol::{PACKAGE_HEADER_SIZE, PackageHeader};

fuzz_target!(|data: &[u8]| {
    // Fuzz header decoding and validation
    if let Some(header) = PackageHeader::peek(data) {
        let _ = header.validate(siridb_protocol::DEFAULT_MAX_PACKAGE_SIZE);
        assert_eq!(header.total_size(), PACKAGE_HEADER_SIZE + header.payload_length());
    }
    let mut cursor = data;
    let _ = PackageHeader::decode(&mut cursor);
});
