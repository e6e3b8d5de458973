//! Performance benchmarks for the transaction log.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use otlog::{empty_document, Document, DocumentMutation, LogConfig, Operation, Revision};
use serde_json::{json, Value};
use std::sync::Arc;

fn populated(depth: i64, config: LogConfig) -> Arc<Document> {
    let doc = Document::with_config(Revision(0), json!({}), config);
    for r in 1..=depth {
        doc.apply(Operation::<Value>::shared(
            Revision(r),
            vec![DocumentMutation::append("items", r)],
        ));
    }
    doc
}

/// Benchmark state reconstruction with varying replay distances
fn bench_state_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_reconstruction");

    for depth in [10, 100, 500, 1000] {
        group.bench_with_input(BenchmarkId::new("cold", depth), &depth, |b, &depth| {
            // No memoization, every call replays from the base
            let doc = populated(depth, LogConfig::default().with_snapshot_interval(0));
            b.iter(|| black_box(doc.log().state_at(Revision(depth)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("memoized", depth), &depth, |b, &depth| {
            let doc = populated(depth, LogConfig::default());
            doc.log().state_at(Revision(depth - 1)).unwrap();
            b.iter(|| black_box(doc.log().state_at(Revision(depth)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark appends
fn bench_append(c: &mut Criterion) {
    c.bench_function("append_1000", |b| {
        b.iter(|| {
            let doc = empty_document();
            for r in 1..=1000 {
                doc.apply(Operation::<Value>::shared(
                    Revision(r),
                    vec![DocumentMutation::set("x", r)],
                ));
            }
            black_box(doc);
        });
    });
}

/// Benchmark incremental log queries against a clean and a dirty log
fn bench_log_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_queries");

    let doc = populated(1000, LogConfig::default());
    group.bench_function("log_at_tail_100", |b| {
        b.iter(|| black_box(doc.log().log_at(Revision(900), false).unwrap()));
    });
    group.bench_function("canonical_clean", |b| {
        b.iter(|| black_box(doc.log().canonical_log()));
    });

    doc.log().mark_dirty();
    group.bench_function("canonical_dirty", |b| {
        b.iter(|| black_box(doc.log().canonical_log()));
    });

    group.finish();
}

criterion_group!(benches, bench_state_reconstruction, bench_append, bench_log_queries);
criterion_main!(benches);
