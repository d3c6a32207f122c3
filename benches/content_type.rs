use bucketstore::content_type::{detect_content_type, sniff};
use bucketstore::{Bucket, CancellationToken, FileBucket};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tempfile::TempDir;

// ============================================================================
// Benchmark: Content Type Detection
// ============================================================================

fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_content_type");

    let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR".to_vec();
    let mut svg = vec![0x01u8; 900];
    svg.extend_from_slice(b"<svg></svg>");
    let binary: Vec<u8> = (0..1024u32).map(|i| (i % 7) as u8).collect();

    group.bench_function("by_extension", |b| {
        b.iter(|| black_box(detect_content_type("photos/cat.jpg", &png)));
    });

    group.bench_function("magic_bytes", |b| {
        b.iter(|| black_box(detect_content_type("upload", &png)));
    });

    group.bench_function("svg_scan", |b| {
        b.iter(|| black_box(detect_content_type("drawing", &svg)));
    });

    group.bench_function("fallback", |b| {
        b.iter(|| black_box(detect_content_type("blob", &binary)));
    });

    group.bench_function("sniff_text", |b| {
        let text = vec![b'a'; 512];
        b.iter(|| black_box(sniff(&text)));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Put / Stats Round Trip
// ============================================================================

fn bench_put_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_bucket");
    group.sample_size(20);

    let temp = TempDir::new().unwrap();
    let bucket = FileBucket::open(temp.path()).unwrap();
    let token = CancellationToken::none();

    for (name, size) in [("1KB", 1024), ("100KB", 100 * 1024), ("1MB", 1024 * 1024)] {
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("put", name), &data, |b, data| {
            b.iter(|| bucket.put_bytes(&token, "bench/object.bin", data).unwrap());
        });
    }

    group.bench_function("stats", |b| {
        b.iter(|| black_box(bucket.stats(&token, "bench/object.bin").unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_detection, bench_put_stats);
criterion_main!(benches);
