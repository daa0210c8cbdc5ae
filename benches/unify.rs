//! Microbenchmarks for the interning and memoization hot paths.

use std::hash::{Hash, Hasher};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fnv::FnvHasher;
use unidd::{variants, Cache, Operation, Term, Unicity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Leaf(pub u64);

variants! {
    #[derive(Debug, PartialEq, Eq, Hash)]
    pub enum Def { Leaf }
}

impl Term for Def {}

/// duplicate-insert churn: the dominant pattern of consing workloads
fn bench_interning(c: &mut Criterion) {
    c.bench_function("intern_duplicate_leaves", |b| {
        let table: Unicity<Def> = Unicity::with_capacity(1 << 12);
        let keep: Vec<_> = (0u64..1024).map(|i| table.make(Leaf(i))).collect();
        b.iter(|| {
            for i in 0u64..1024 {
                black_box(table.make(Leaf(i)));
            }
        });
        drop(keep);
    });
}

fn bench_cache_hits(c: &mut Criterion) {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Mul(u64, u64);

    impl Operation for Mul {
        type Context = ();
        type Output = u64;
        type Error = std::convert::Infallible;

        fn apply(&self, _cxt: &()) -> Result<u64, Self::Error> {
            Ok(self.0.wrapping_mul(self.1))
        }
    }

    c.bench_function("cache_hits", |b| {
        let cache: Cache<Mul> = Cache::new(1 << 10);
        for i in 0u64..1024 {
            cache.apply(&(), Mul(i, 3)).unwrap();
        }
        b.iter(|| {
            for i in 0u64..1024 {
                black_box(cache.apply(&(), Mul(i, 3)).unwrap());
            }
        });
    });
}

/// the crate-wide hasher against the other hasher of the house
fn bench_hashers(c: &mut Criterion) {
    let keys: Vec<(u64, u64, u64)> = (0..1024).map(|i| (i, i * 31, i ^ 0xDEAD)).collect();
    c.bench_function("fx_u64hash", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(unidd::hash::u64hash(key));
            }
        })
    });
    c.bench_function("fnv_u64hash", |b| {
        b.iter(|| {
            for key in &keys {
                let mut hasher = FnvHasher::default();
                key.hash(&mut hasher);
                black_box(hasher.finish());
            }
        })
    });
}

criterion_group!(benches, bench_interning, bench_cache_hits, bench_hashers);
criterion_main!(benches);
