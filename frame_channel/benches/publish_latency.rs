//! Publish and read latency benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use frame_channel::{FrameChannel, FrameReader};
use std::hint::black_box;

fn bench_base(tag: &str) -> String {
    format!("fc_bench_{tag}_{}", std::process::id())
}

/// Benchmark publish for typical frame sizes
fn bench_publish(c: &mut Criterion) {
    let mut channel = FrameChannel::open(&bench_base("publish"), 0o600, true).unwrap();
    let mut group = c.benchmark_group("publish");

    for size in [64usize, 4096, 640 * 480 * 2, 1920 * 1080 * 3] {
        let payload = vec![0xAAu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(channel.publish(payload, 1, 640, 480, 0.0)));
        });
    }

    group.finish();
    channel.close().unwrap();
}

/// Benchmark the consumer copy under the slot lock
fn bench_read_latest(c: &mut Criterion) {
    let base = bench_base("read");
    let mut channel = FrameChannel::open(&base, 0o600, true).unwrap();
    let reader = FrameReader::attach(&base).unwrap();

    let payload = vec![0x55u8; 640 * 480 * 2];
    channel.publish(&payload, 1, 640, 480, 0.0);

    c.bench_function("read_latest_vga_yuyv", |b| {
        b.iter(|| {
            let latest = black_box(reader.read_latest().unwrap());
            black_box(latest.data.len());
        });
    });

    drop(reader);
    channel.close().unwrap();
}

/// Benchmark a full publish + signal + read cycle
fn bench_roundtrip(c: &mut Criterion) {
    let base = bench_base("roundtrip");
    let mut channel = FrameChannel::open(&base, 0o600, true).unwrap();
    let reader = FrameReader::attach(&base).unwrap();
    let payload = vec![0xAAu8; 4096];

    c.bench_function("roundtrip_4k", |b| {
        b.iter(|| {
            channel.publish(&payload, 1, 64, 64, 0.0);
            black_box(reader.wait_frame(std::time::Duration::ZERO).unwrap());
            black_box(reader.read_latest().unwrap());
        });
    });

    drop(reader);
    channel.close().unwrap();
}

criterion_group!(benches, bench_publish, bench_read_latest, bench_roundtrip);
criterion_main!(benches);
