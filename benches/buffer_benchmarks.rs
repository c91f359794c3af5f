//! Benchmarks for buffer construction, dirty checks and saving.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kestrel_buffer::Loc;
use kestrel_core::{Buffer, Context};

/// Generates a text string for benchmarking.
fn generate_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("Line {}: This is a sample line of text for benchmarking purposes.\n", i))
        .collect()
}

/// Benchmarks construction, which includes syntax resolution and hashing.
fn bench_buffer_creation(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let ctx = Context::with_defaults(dir.path());
    let mut group = c.benchmark_group("buffer_creation");

    for size in [100, 700, 10000].iter() {
        let text = generate_text(*size);

        group.bench_with_input(BenchmarkId::new("from_string", size), &text, |b, text| {
            b.iter(|| {
                let buffer = Buffer::from_string(black_box(text), "bench.txt", ctx.clone());
                black_box(buffer)
            })
        });

        group.bench_with_input(BenchmarkId::new("from_string_c", size), &text, |b, text| {
            b.iter(|| {
                let buffer = Buffer::from_string(black_box(text), "bench.c", ctx.clone());
                black_box(buffer)
            })
        });
    }

    group.finish();
}

/// Benchmarks `modified()` in hashing mode against the flag fallback.
fn bench_modified(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let ctx = Context::with_defaults(dir.path());
    let mut group = c.benchmark_group("modified");

    // Just under the large file threshold, so content is hashed
    let hashed = Buffer::from_string(&generate_text(700), "small.txt", ctx.clone());
    group.bench_function("hash", |b| b.iter(|| black_box(hashed.modified())));

    let flagged = Buffer::from_string(&generate_text(10000), "large.txt", ctx);
    group.bench_function("fastdirty", |b| b.iter(|| black_box(flagged.modified())));

    group.finish();
}

/// Benchmarks edits followed by a save.
fn bench_save(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let ctx = Context::with_defaults(dir.path());
    let path = dir.path().join("save.txt");
    let path = path.to_str().expect("utf-8 temp path").to_string();
    let text = generate_text(1000);

    c.bench_function("insert_and_save", |b| {
        b.iter_with_setup(
            || Buffer::from_string(&text, &path, ctx.clone()),
            |mut buffer| {
                buffer.insert(Loc::new(0, 500), black_box(b"inserted text")).expect("insert");
                buffer.save().expect("save");
                black_box(buffer)
            },
        )
    });
}

criterion_group!(benches, bench_buffer_creation, bench_modified, bench_save);

criterion_main!(benches);
