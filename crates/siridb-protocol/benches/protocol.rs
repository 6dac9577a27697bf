//! Benchmarks for package header encoding and decoding.

#![allow(clippy::unwrap_used, missing_docs)]

use std::hint::black_box;

use bytes::BytesMut;
use criterion::{Criterion, criterion_group, criterion_main};
use siridb_protocol::{DEFAULT_MAX_PACKAGE_SIZE, PACKAGE_HEADER_SIZE, PackageHeader, RequestType};

/// Benchmark package header encoding.
fn bench_header_encode(c: &mut Criterion) {
    let header = PackageHeader::new(42, RequestType::Query.into(), 1000);

    c.bench_function("package_header_encode", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(PACKAGE_HEADER_SIZE);
            header.encode(&mut buf);
            black_box(buf)
        })
    });
}

/// Benchmark package header decoding plus validation.
fn bench_header_decode(c: &mut Criterion) {
    let encoded = PackageHeader::new(42, RequestType::Query.into(), 1000).encode_to_bytes();

    c.bench_function("package_header_decode", |b| {
        b.iter(|| {
            let header = PackageHeader::peek(&encoded).unwrap();
            header.validate(DEFAULT_MAX_PACKAGE_SIZE).unwrap();
            black_box(header)
        })
    });
}

criterion_group!(benches, bench_header_encode, bench_header_decode);
criterion_main!(benches);
