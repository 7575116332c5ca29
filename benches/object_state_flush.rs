use std::sync::Arc;

use criterion::{
    black_box,
    criterion_group,
    criterion_main,
    Criterion,
};
use symex_core::{
    array::Array,
    expr::Interner,
    memory::{
        object_state::ObjectState,
        MemoryObject,
    },
    thread::ThreadId,
};

const OBJECT_SIZE: u32 = 4096;

fn fresh_object_state() -> (ObjectState, Interner) {
    let object = Arc::new(MemoryObject::new(0x1000, OBJECT_SIZE, true, false, false));
    let backing = Arc::new(Array::symbolic("bench", OBJECT_SIZE));
    (ObjectState::new_concrete(object, backing, 0), Interner::new())
}

/// Flushing an entire 4 KiB object via a single symbolic-offset read,
/// which forces every byte of the concrete cache into the update list
/// (§4.2's "symbolic offset flushes the whole relevant range").
fn bench_full_flush(c: &mut Criterion) {
    c.bench_function("object_state_flush/full_flush_on_symbolic_read", |b| {
        b.iter(|| {
            let (mut state, mut interner) = fresh_object_state();
            let index = interner.create(symex_core::expr::Builder::NotOptimized(interner.const_u128(0, 32))).unwrap();
            black_box(state.read8_symbolic(index, &mut interner).unwrap())
        })
    });
}

/// Second symbolic-offset read against an already-flushed object: per
/// the flush-idempotence property (§8), this must not re-flush and
/// should be dominated by the `Read` construction itself.
fn bench_flush_idempotence(c: &mut Criterion) {
    let (mut state, mut interner) = fresh_object_state();
    let index = interner.create(symex_core::expr::Builder::NotOptimized(interner.const_u128(0, 32))).unwrap();
    state.read8_symbolic(index, &mut interner).unwrap();
    c.bench_function("object_state_flush/repeat_read_after_flush", |b| {
        b.iter(|| black_box(state.read8_symbolic(index, &mut interner).unwrap()))
    });
}

/// Sequential concrete byte writes across the whole object, the common
/// case of a `memcpy`-shaped loop touching every byte once.
fn bench_sequential_concrete_writes(c: &mut Criterion) {
    c.bench_function("object_state_flush/sequential_concrete_writes", |b| {
        b.iter(|| {
            let (mut state, mut interner) = fresh_object_state();
            for offset in 0..OBJECT_SIZE {
                let value = interner.const_u128((offset % 256) as u128, 8);
                state.write8(offset, value, ThreadId::new(1), 0, &mut interner).unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_full_flush, bench_flush_idempotence, bench_sequential_concrete_writes);
criterion_main!(benches);
