//! Benchmarks for container packing and unpacking
//!
//! Covers the two shapes that dominate CHDK traffic: short command/response
//! containers during script polling and large data containers for live view
//! and file downloads.

use chdk_ptp::Container;
use chdk_ptp::container::codes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_parameter_containers(c: &mut Criterion) {
    let response = Container::response(codes::response::OK, vec![0, 7, 2, 4, 1]);
    let packed = response.pack();

    c.bench_function("pack_response", |b| b.iter(|| black_box(&response).pack()));
    c.bench_function("unpack_response", |b| b.iter(|| Container::unpack(black_box(&packed))));
}

fn bench_data_containers(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_container");

    for size in [512usize, 64 * 1024, 1024 * 1024] {
        let container = Container::data(codes::operation::CHDK, vec![0xA5; size]);
        let packed = container.pack();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("pack", size), &container, |b, container| {
            b.iter(|| black_box(container).pack())
        });
        group.bench_with_input(BenchmarkId::new("unpack", size), &packed, |b, packed| {
            b.iter(|| Container::unpack(black_box(packed)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parameter_containers, bench_data_containers);
criterion_main!(benches);
