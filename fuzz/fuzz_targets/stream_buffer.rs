#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use siridb_codec::{Package, StreamBuffer};

const MAX_PACKAGE_SIZE: usize = 1 << 16;

#[derive(Debug, Arbitrary)]
struct Input {
    data: Vec<u8>,
    splits: Vec<u8>,
    read_size: u8,
}

/// Feed `chunks` in order, collecting packages until the first error.
fn reassemble<'a>(
    chunks: impl Iterator<Item = &'a [u8]>,
    read_size: usize,
) -> (Vec<Package>, bool) {
    let mut buffer = StreamBuffer::with_limits(MAX_PACKAGE_SIZE, read_size);
    let mut packages = Vec::new();
    for chunk in chunks {
        let Ok(frames) = buffer.append(chunk) else {
            return (packages, true);
        };
        for frame in frames {
            match frame {
                Ok(package) => packages.push(package),
                Err(_) => return (packages, true),
            }
        }
    }
    (packages, false)
}

fuzz_target!(|input: Input| {
    let read_size = usize::from(input.read_size).max(1);

    let (whole, whole_failed) = reassemble(std::iter::once(input.data.as_slice()), read_size);

    // Split the same bytes at fuzzer-chosen points
    let mut chunks = Vec::new();
    let mut rest = input.data.as_slice();
    for split in input.splits {
        if rest.is_empty() {
            break;
        }
        let (head, tail) = rest.split_at(usize::from(split).min(rest.len()));
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);
    let (pieces, pieces_failed) = reassemble(chunks.into_iter(), read_size);

    // Reassembly does not depend on how the stream was chunked
    assert_eq!(whole, pieces);
    assert_eq!(whole_failed, pieces_failed);
});
