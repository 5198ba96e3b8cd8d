//! Criterion microbenches for transferpack hot paths.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - Path map normalization by join key (normalize)
//! - Identity reconciliation for many single- and multi-image files (reconcile)
//! - Transfer graph parsing (from_json_str)

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use transferpack::graph::io_json::{from_json_str, to_json_string};
use transferpack::graph::{GraphRef, Image, ImageId, PendingFile, TransferGraph};
use transferpack::packet::PathIdMap;
use transferpack::reconcile::{normalize, reconcile};

const FILES: u64 = 2_000;

/// `FILES` files, every fourth one holding three images.
fn path_map(base: &str, first_id: u64) -> PathIdMap {
    let mut next = first_id;
    (0..FILES)
        .map(|n| {
            let count = if n % 4 == 0 { 3 } else { 1 };
            let ids = (0..count)
                .map(|_| {
                    next += 1;
                    ImageId(next)
                })
                .collect();
            (format!("{}/./2024/{:02}/file_{}.tif", base, n % 12, n), ids)
        })
        .collect()
}

fn graph_fixture() -> String {
    let graph = TransferGraph {
        images: (1..=500)
            .map(|id| Image {
                id: GraphRef::image(ImageId(id)).unwrap(),
                name: format!("image_{}.tif", id),
                annotation_refs: vec![],
                roi_refs: vec![],
            })
            .collect(),
        pending_files: (1..=500)
            .map(|id| PendingFile {
                image: GraphRef::image(ImageId(id)).unwrap(),
                path: format!("/repo/./Fileset_{}/image_{}.tif", id, id),
            })
            .collect(),
        ..Default::default()
    };
    to_json_string(&graph).unwrap()
}

/// Benchmark re-keying a path map by join key.
fn bench_normalize(c: &mut Criterion) {
    let source = path_map("/srv/ManagedRepository", 0);
    let mut group = c.benchmark_group("reconcile");
    group.throughput(Throughput::Elements(FILES));

    group.bench_function("normalize", |b| {
        b.iter(|| black_box(normalize(black_box(&source))))
    });

    group.finish();
}

/// Benchmark full source-to-destination reconciliation.
fn bench_reconcile(c: &mut Criterion) {
    let source = path_map("/srv/ManagedRepository", 0);
    let dest = path_map("/tmp/packet", 1_000_000);
    let mut group = c.benchmark_group("reconcile");
    group.throughput(Throughput::Elements(FILES));

    group.bench_function("reconcile", |b| {
        b.iter(|| {
            let result = reconcile(black_box(&source), black_box(&dest)).unwrap();
            black_box(result)
        })
    });

    group.finish();
}

/// Benchmark transfer graph parsing from a string.
fn bench_graph_parse(c: &mut Criterion) {
    let json = graph_fixture();
    let mut group = c.benchmark_group("graph_parse");
    group.throughput(Throughput::Bytes(json.len() as u64));

    group.bench_function("from_json_str", |b| {
        b.iter(|| {
            let graph = from_json_str(black_box(&json)).unwrap();
            black_box(graph)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_reconcile, bench_graph_parse);
criterion_main!(benches);
