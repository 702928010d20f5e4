//! Criterion micro-benchmarks for generational pool operations.

use std::alloc::Layout;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use strata::prelude::*;
use strata_bench::{churn_ops, ChurnOp};

const CAPACITY: u32 = 4096;

fn bench_create_destroy(c: &mut Criterion) {
    let mut pool = Pool::with_capacity(CAPACITY, Layout::new::<[u64; 4]>()).unwrap();

    c.bench_function("pool_create_destroy_pair", |b| {
        b.iter(|| {
            let h = pool.create();
            black_box(pool.get_ptr(h));
            pool.destroy(h);
        });
    });
}

fn bench_churn(c: &mut Criterion) {
    let ops = churn_ops(7, 10_000);

    c.bench_function("pool_churn_10k", |b| {
        b.iter(|| {
            let mut pool = Pool::with_capacity(CAPACITY, Layout::new::<u64>()).unwrap();
            let mut live: Vec<PoolHandle> = Vec::with_capacity(CAPACITY as usize);
            for op in &ops {
                match *op {
                    ChurnOp::Create => {
                        let h = pool.create();
                        if !h.is_invalid() {
                            live.push(h);
                        }
                    }
                    ChurnOp::Destroy(i) if !live.is_empty() => {
                        let h = live.swap_remove(i as usize % live.len());
                        pool.destroy(h);
                    }
                    ChurnOp::Destroy(_) => {}
                }
            }
            black_box(pool.len())
        });
    });
}

fn bench_is_valid(c: &mut Criterion) {
    let mut pool = Pool::with_capacity(CAPACITY, Layout::new::<u32>()).unwrap();
    let handles: Vec<_> = (0..CAPACITY).map(|_| pool.create()).collect();

    c.bench_function("pool_is_valid_4k", |b| {
        b.iter(|| handles.iter().filter(|&&h| pool.is_valid(h)).count());
    });
}

fn bench_typed(c: &mut Criterion) {
    let mut pool = TypedPool::<[u64; 8]>::with_capacity(CAPACITY).unwrap();

    c.bench_function("typed_pool_insert_get_remove", |b| {
        b.iter(|| {
            let h = pool.insert([1; 8]).unwrap();
            black_box(pool.get(h));
            pool.remove(h)
        });
    });
}

criterion_group!(
    benches,
    bench_create_destroy,
    bench_churn,
    bench_is_valid,
    bench_typed,
);
criterion_main!(benches);
