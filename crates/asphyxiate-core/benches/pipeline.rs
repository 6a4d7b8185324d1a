//! Benchmarks for the two-phase documentation pipeline
//!
//! Headers are generated with a fixed shape: a file marker, one group per
//! file, a documented struct and a run of functions that reference each
//! other and the struct.

use std::fmt::Write;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use asphyxiate_core::{ExtractorConfig, Pipeline};

/// Generate one header with `functions` documented functions
fn generate_header(index: usize, functions: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "/** @file\n * Generated header {index}.\n */");
    let _ = writeln!(out, "/** @defgroup g{index} Group {index}\n * @{{\n */");
    let _ = writeln!(
        out,
        "/** Record {index}. */\nstruct rec{index} {{\n  int id; /**< Identifier. */\n  char name[16]; /**< Name. */\n}};"
    );
    for f in 0..functions {
        let _ = writeln!(
            out,
            "/**\n * Step {f} of file {index}. Calls fn{index}_{next}() with ::rec{index}.\n * @param r the rec{index}\n * @param n count\n * @return status\n */\nint fn{index}_{f}(struct rec{index} *r, int n);",
            next = (f + 1) % functions
        );
    }
    let _ = writeln!(out, "/** @}} */");
    out
}

fn generate_batch(files: usize, functions: usize) -> Vec<(String, String)> {
    (0..files)
        .map(|i| (format!("gen{i}.h"), generate_header(i, functions)))
        .collect()
}

/// Benchmark a full run, parallel and sequential
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for files in [1, 16, 64] {
        let batch = generate_batch(files, 50);
        let bytes: usize = batch.iter().map(|(_, s)| s.len()).sum();
        group.throughput(Throughput::Bytes(bytes as u64));

        let parallel = Pipeline::new(ExtractorConfig::default());
        group.bench_with_input(BenchmarkId::new("parallel", files), &batch, |b, batch| {
            b.iter(|| black_box(parallel.run(batch)));
        });

        let sequential = Pipeline::new(ExtractorConfig::default().with_parallel(false));
        group.bench_with_input(BenchmarkId::new("sequential", files), &batch, |b, batch| {
            b.iter(|| black_box(sequential.run(batch)));
        });
    }

    group.finish();
}

/// Benchmark Phase 1 alone
fn bench_registration(c: &mut Criterion) {
    let batch = generate_batch(16, 50);
    let pipeline = Pipeline::new(ExtractorConfig::default());
    c.bench_function("register_16_files", |b| {
        b.iter(|| black_box(pipeline.register(&batch)));
    });
}

criterion_group!(benches, bench_pipeline, bench_registration);
criterion_main!(benches);
