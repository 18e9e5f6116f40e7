//! Index benchmarks - insert and range-scan throughput

use bplus_index::{AttrType, BTreeIndex, Error, IndexConfig, MemRelation, Operator, RecordId};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use tempfile::TempDir;

fn open_empty(dir: &TempDir) -> BTreeIndex {
    let config = IndexConfig::new(dir.path()).with_pool_size(256);
    BTreeIndex::open(&MemRelation::new("bench"), 0, AttrType::Integer, &config).unwrap()
}

/// Keys in a fixed scrambled order, so runs are comparable.
fn scrambled(n: i32) -> Vec<i32> {
    (0..n).map(|i| ((i as i64 * 2_654_435_761) % n as i64) as i32).collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Index/Insert");
    group.sample_size(10);

    for &count in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            b.iter_with_setup(
                || TempDir::new().unwrap(),
                |dir| {
                    let mut index = open_empty(&dir);
                    for k in 0..count {
                        index.insert_entry(k, RecordId::new(k as u32, 0)).unwrap();
                    }
                    black_box(index.stats().leaf_splits)
                },
            );
        });

        let keys = scrambled(count);
        group.bench_with_input(BenchmarkId::new("scrambled", count), &keys, |b, keys| {
            b.iter_with_setup(
                || TempDir::new().unwrap(),
                |dir| {
                    let mut index = open_empty(&dir);
                    for &k in keys {
                        index.insert_entry(k, RecordId::new(k as u32, 0)).unwrap();
                    }
                    black_box(index.stats().leaf_splits)
                },
            );
        });
    }

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("Index/Scan");

    let dir = TempDir::new().unwrap();
    let mut index = open_empty(&dir);
    for k in scrambled(50_000) {
        index.insert_entry(k, RecordId::new(k as u32, 0)).unwrap();
    }

    for &width in [10, 1_000, 20_000].iter() {
        group.bench_with_input(BenchmarkId::new("range", width), &width, |b, &width| {
            b.iter(|| {
                index
                    .start_scan(10_000, Operator::Gte, 10_000 + width, Operator::Lt)
                    .unwrap();
                let mut n = 0u32;
                loop {
                    match index.scan_next() {
                        Ok(rid) => n = n.wrapping_add(rid.page_number),
                        Err(Error::ScanExhausted) => break,
                        Err(e) => panic!("{e}"),
                    }
                }
                index.end_scan().unwrap();
                black_box(n)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_scan);
criterion_main!(benches);
