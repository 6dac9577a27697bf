//! Benchmarks for stream reassembly.

#![allow(clippy::unwrap_used, missing_docs)]

use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use siridb_codec::{Package, StreamBuffer};

fn wire(count: usize, payload_len: usize) -> Vec<u8> {
    let payload = vec![0xAB; payload_len];
    (0..count)
        .flat_map(|pid| Package::new(pid as u16, 0, &payload).into_frame().to_vec())
        .collect()
}

/// One package per delivery, the common case for request/response traffic.
fn bench_one_package_per_read(c: &mut Criterion) {
    let data = wire(1, 1024);
    let mut group = c.benchmark_group("stream_buffer");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("one_package_per_read", |b| {
        let mut buffer = StreamBuffer::new();
        b.iter(|| {
            for package in buffer.append(black_box(&data)).unwrap() {
                black_box(package.unwrap());
            }
        })
    });
    group.finish();
}

/// Many small packages coalesced and delivered in small fragments.
fn bench_fragmented_stream(c: &mut Criterion) {
    let data = wire(64, 100);
    let mut group = c.benchmark_group("stream_buffer");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("fragmented_37_byte_reads", |b| {
        let mut buffer = StreamBuffer::new();
        b.iter(|| {
            for chunk in data.chunks(37) {
                for package in buffer.append(chunk).unwrap() {
                    black_box(package.unwrap());
                }
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_one_package_per_read, bench_fragmented_stream);
criterion_main!(benches);
