use criterion::{
    black_box,
    criterion_group,
    criterion_main,
    Criterion,
};
use symex_core::expr::{
    Builder,
    Interner,
};

/// Interning a fresh symbolic `Add` chain, hitting the dedup table on
/// every step but never folding (operands are never both constant).
fn bench_add_chain_interning(c: &mut Criterion) {
    c.bench_function("expr_interning/add_chain_fresh", |b| {
        b.iter(|| {
            let mut i = Interner::new();
            let mut acc = i.const_u128(0, 32);
            for k in 0..256u128 {
                let k = i.const_u128(k, 32);
                acc = i.create(Builder::Add(acc, k)).unwrap();
            }
            black_box(acc)
        })
    });
}

/// Re-interning the exact same expression tree repeatedly; every `create`
/// call should hit the hash-cons table and return the same `ExprRef`
/// without allocating a new node.
fn bench_dedup_hit_rate(c: &mut Criterion) {
    let mut i = Interner::new();
    let a = i.const_u128(3, 32);
    let b = i.const_u128(5, 32);
    c.bench_function("expr_interning/dedup_repeated_add", |b_| {
        b_.iter(|| black_box(i.create(Builder::Add(a, b)).unwrap()))
    });
}

/// Canonicalisation cost for a deeply left-nested `Add` of constants,
/// which the constant-folding rules of §4.1 collapse to a single constant
/// at construction time.
fn bench_constant_fold_collapse(c: &mut Criterion) {
    c.bench_function("expr_interning/constant_fold_collapse", |b| {
        b.iter(|| {
            let mut i = Interner::new();
            let mut acc = i.const_u128(1, 32);
            for _ in 0..64 {
                let one = i.const_u128(1, 32);
                acc = i.create(Builder::Add(acc, one)).unwrap();
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_add_chain_interning, bench_dedup_hit_rate, bench_constant_fold_collapse);
criterion_main!(benches);
