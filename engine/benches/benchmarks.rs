//! Performance benchmarks for catalog-engine

use catalog_engine::{
    apply, fetch_all, Item, MemoryMirror, MemorySource, MirrorTables, Reconciler, RemoteCollector,
    Snapshot,
};
use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

fn record(i: usize, rate: usize) -> Value {
    json!({
        "item_id": format!("{}", 460000000000000u64 + i as u64),
        "name": format!("Item {}", i),
        "sku": format!("SKU-{:05}", i),
        "status": "active",
        "rate": rate,
        "purchase_rate": rate / 2,
        "is_taxable": i % 3 != 0,
        "last_modified_time": "2026-01-01T00:00:00+0000",
    })
}

fn catalog(size: usize, rate: usize) -> Vec<Item> {
    (0..size)
        .map(|i| Item::from_value(record(i, rate)).unwrap())
        .collect()
}

/// Remote and mirror catalogs overlapping on half their keys, with every
/// fourth shared item carrying a changed rate.
fn overlapping(size: usize) -> (Snapshot, Snapshot) {
    let remote: Vec<Item> = (size / 2..size + size / 2)
        .map(|i| Item::from_value(record(i, if i % 4 == 0 { 20 } else { 10 })).unwrap())
        .collect();
    let mirror = catalog(size, 10);
    (
        Snapshot::from_items(remote).unwrap(),
        Snapshot::from_items(mirror).unwrap(),
    )
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("collect_remote", size), size, |b, &size| {
            let records: Vec<Value> = (0..size).map(|i| record(i, 10)).collect();

            b.iter(|| {
                let mut collector = RemoteCollector::new();
                for record in records.iter().cloned() {
                    collector.push(1, black_box(record));
                }
                collector.finish()
            })
        });
    }

    group.finish();
}

fn bench_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("reconcile", size), size, |b, &size| {
            let (remote, mirror) = overlapping(size);
            let reconciler = Reconciler::default();

            b.iter(|| reconciler.reconcile(black_box(&remote), black_box(&mirror)))
        });

        group.bench_with_input(BenchmarkId::new("unchanged", size), size, |b, &size| {
            let remote = Snapshot::from_items(catalog(size, 10)).unwrap();
            let mirror = Snapshot::from_items(catalog(size, 10)).unwrap();
            let reconciler = Reconciler::default();

            b.iter(|| reconciler.reconcile(black_box(&remote), black_box(&mirror)))
        });
    }

    group.finish();
}

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("apply", size), size, |b, &size| {
            let (remote, mirror) = overlapping(size);
            let batch = Reconciler::default().reconcile(&remote, &mirror);
            let tables = MirrorTables::default();

            b.iter(|| {
                let mut store = MemoryMirror::new();
                store.seed(&tables.items, mirror.iter().cloned());
                runtime.block_on(apply(&mut store, &tables, black_box(&batch), at))
            })
        });

        group.bench_with_input(BenchmarkId::new("fetch_all", size), size, |b, &size| {
            let records: Vec<Value> = (0..size).map(|i| record(i, 10)).collect();

            b.iter(|| {
                let mut source = MemorySource::paged(records.clone(), 200);
                runtime.block_on(fetch_all(&mut source, 100))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_snapshot, bench_reconciliation, bench_cycle);
criterion_main!(benches);
