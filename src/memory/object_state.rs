//! Per-path contents of one [`super::MemoryObject`] (spec component C3).
//!
//! Grounded on the original implementation's `ObjectState`
//! (`lib/Core/Memory.h`): a concrete byte cache with a concrete-valid mask,
//! a flushed mask, a per-byte known-symbolic overlay, and a single
//! [`UpdateList`] that becomes authoritative for any byte once it has been
//! flushed. The cache invariant (§3.3): for every byte, at most one of
//! {concrete-valid, known-symbolic, flushed} describes its authoritative
//! value.

use alloc::{
    sync::Arc,
    vec::Vec,
};

use crate::{
    array::{
        Array,
        UpdateList,
    },
    error::{
        PanicReason,
        SimpleResult,
    },
    expr::{
        Builder,
        ExprRef,
        Interner,
    },
    memory::{
        race::{
            MemoryRace,
            RaceLog,
        },
        MemoryObjectRef,
    },
    thread::ThreadId,
};

/// Mutable, per-path contents of a [`super::MemoryObject`].
#[derive(Debug, Clone)]
pub struct ObjectState {
    object: MemoryObjectRef,
    concrete_store: Vec<u8>,
    concrete_mask: Vec<bool>,
    flushed_mask: Vec<bool>,
    known_symbolics: Vec<Option<ExprRef>>,
    updates: UpdateList,
    race_log: RaceLog,
    /// Owning state's copy-on-write key; exclusively for
    /// [`super::address_space::AddressSpace`].
    pub(crate) copy_on_write_owner: u64,
    /// When set, all writes are rejected with [`PanicReason::ReadOnly`].
    pub read_only: bool,
    /// Whether this object is shared across address spaces within the same
    /// state (e.g. a workgroup-local allocation visible to every thread in
    /// the group).
    pub is_shared: bool,
}

impl ObjectState {
    /// A new object with concrete, zero-initialised contents. `backing` is
    /// used only if a later symbolic-offset access forces a flush.
    pub fn new_concrete(object: MemoryObjectRef, backing: Arc<Array>, owner: u64) -> Self {
        let size = object.size as usize;
        Self {
            object,
            concrete_store: alloc::vec![0u8; size],
            concrete_mask: alloc::vec![true; size],
            flushed_mask: alloc::vec![false; size],
            known_symbolics: alloc::vec![None; size],
            updates: UpdateList::fresh(backing),
            race_log: RaceLog::new(object_size_u32(size)),
            copy_on_write_owner: owner,
            read_only: false,
            is_shared: false,
        }
    }

    /// A new object whose contents are entirely symbolic, backed by
    /// `array` (expected to itself be fully symbolic).
    pub fn new_symbolic(object: MemoryObjectRef, array: Arc<Array>, owner: u64) -> Self {
        let size = object.size as usize;
        Self {
            object,
            concrete_store: alloc::vec![0u8; size],
            concrete_mask: alloc::vec![false; size],
            flushed_mask: alloc::vec![true; size],
            known_symbolics: alloc::vec![None; size],
            updates: UpdateList::fresh(array),
            race_log: RaceLog::new(object_size_u32(size)),
            copy_on_write_owner: owner,
            read_only: false,
            is_shared: false,
        }
    }

    /// The object this state belongs to.
    pub fn object(&self) -> &MemoryObjectRef {
        &self.object
    }

    fn size(&self) -> u32 {
        self.object.size
    }

    fn bounds_check(&self, offset: u32, len: u32) -> SimpleResult<()> {
        if offset as u64 + len as u64 > self.size() as u64 {
            return Err(PanicReason::OutOfBounds { offset: offset as u64, size: self.size() as u64 });
        }
        Ok(())
    }

    /// Read one byte at a concrete `offset`, without touching the race log
    /// or the update list unless the byte is already flushed.
    fn read8_value(&mut self, offset: u32, interner: &mut Interner) -> SimpleResult<ExprRef> {
        let idx = offset as usize;
        if self.concrete_mask[idx] {
            return Ok(interner.const_u128(self.concrete_store[idx] as u128, 8));
        }
        if let Some(e) = self.known_symbolics[idx] {
            return Ok(e);
        }
        let index_expr = interner.const_u128(offset as u128, 32);
        interner.read(self.updates.clone(), index_expr)
    }

    fn flush_byte(&mut self, offset: u32, interner: &mut Interner) -> SimpleResult<()> {
        let idx = offset as usize;
        if self.flushed_mask[idx] {
            return Ok(());
        }
        let value = self.read8_value(offset, interner)?;
        let index_expr = interner.const_u128(offset as u128, 32);
        self.updates = self.updates.write(index_expr, value);
        self.flushed_mask[idx] = true;
        self.concrete_mask[idx] = false;
        self.known_symbolics[idx] = None;
        Ok(())
    }

    /// Flush every unflushed byte into the update list, in ascending order.
    /// Called before any symbolic-offset access, since the index could
    /// name any byte of the object (§4.2).
    pub fn flush_all(&mut self, interner: &mut Interner) -> SimpleResult<()> {
        for offset in 0..self.size() {
            self.flush_byte(offset, interner)?;
        }
        Ok(())
    }

    /// Read one byte at a concrete offset, with race logging against
    /// `thread`/`workgroup`.
    pub fn read8(
        &mut self,
        offset: u32,
        thread: ThreadId,
        workgroup: u32,
        interner: &mut Interner,
    ) -> SimpleResult<(ExprRef, Option<MemoryRace>)> {
        self.bounds_check(offset, 1)?;
        let race = self.race_log.log_read(offset, thread, workgroup);
        let value = self.read8_value(offset, interner)?;
        Ok((value, race))
    }

    /// Write one byte at a concrete offset, with race logging.
    pub fn write8(
        &mut self,
        offset: u32,
        value: ExprRef,
        thread: ThreadId,
        workgroup: u32,
        interner: &mut Interner,
    ) -> SimpleResult<Option<MemoryRace>> {
        self.bounds_check(offset, 1)?;
        if self.read_only {
            return Err(PanicReason::ReadOnly);
        }
        let race = self.race_log.log_write(offset, thread, workgroup);
        let idx = offset as usize;
        if self.flushed_mask[idx] {
            let index_expr = interner.const_u128(offset as u128, 32);
            self.updates = self.updates.write(index_expr, value);
            return Ok(race);
        }
        if let Some(bv) = interner.int_constant(value) {
            if bv.width() == 8 {
                self.concrete_store[idx] = bv.to_u128() as u8;
                self.concrete_mask[idx] = true;
                self.known_symbolics[idx] = None;
                return Ok(race);
            }
        }
        self.known_symbolics[idx] = Some(value);
        self.concrete_mask[idx] = false;
        Ok(race)
    }

    /// Read `width` bits (1, or a multiple of 8) starting at a concrete
    /// byte `offset`, composing successive byte reads with `Concat`
    /// (little-endian: lower offsets are less significant).
    pub fn read(
        &mut self,
        offset: u32,
        width: u32,
        thread: ThreadId,
        workgroup: u32,
        interner: &mut Interner,
    ) -> SimpleResult<(ExprRef, Vec<MemoryRace>)> {
        if width == 1 {
            let (byte, race) = self.read8(offset, thread, workgroup, interner)?;
            let bit = interner.create(Builder::Extract(byte, 0, 1))?;
            return Ok((bit, race.into_iter().collect()));
        }
        if width % 8 != 0 {
            return Err(PanicReason::UnsupportedWidth(width));
        }
        let n_bytes = width / 8;
        self.bounds_check(offset, n_bytes)?;
        let mut races = Vec::new();
        let (mut acc, race) = self.read8(offset + n_bytes - 1, thread, workgroup, interner)?;
        races.extend(race);
        for i in (0..n_bytes - 1).rev() {
            let (byte, race) = self.read8(offset + i, thread, workgroup, interner)?;
            races.extend(race);
            acc = interner.create(Builder::Concat(acc, byte))?;
        }
        Ok((acc, races))
    }

    /// Write `width` bits (1, or a multiple of 8) starting at a concrete
    /// byte `offset`, splitting `value` into bytes with `Extract`.
    pub fn write(
        &mut self,
        offset: u32,
        value: ExprRef,
        width: u32,
        thread: ThreadId,
        workgroup: u32,
        interner: &mut Interner,
    ) -> SimpleResult<Vec<MemoryRace>> {
        if width == 1 {
            let byte = interner.create(Builder::ZExt(value, 8))?;
            return self.write8(offset, byte, thread, workgroup, interner).map(|r| r.into_iter().collect());
        }
        if width % 8 != 0 {
            return Err(PanicReason::UnsupportedWidth(width));
        }
        let n_bytes = width / 8;
        self.bounds_check(offset, n_bytes)?;
        let mut races = Vec::new();
        for i in 0..n_bytes {
            let byte = interner.create(Builder::Extract(value, i * 8, 8))?;
            if let Some(race) = self.write8(offset + i, byte, thread, workgroup, interner)? {
                races.push(race);
            }
        }
        Ok(races)
    }

    /// Read one byte at a symbolic `offset` expression (width 32). Flushes
    /// the entire object first, since the index may name any byte.
    pub fn read8_symbolic(&mut self, offset: ExprRef, interner: &mut Interner) -> SimpleResult<ExprRef> {
        self.flush_all(interner)?;
        interner.read(self.updates.clone(), offset)
    }

    /// Write one byte at a symbolic `offset` expression. Flushes the
    /// entire object first and appends the write, conservatively
    /// invalidating the whole concrete/known-symbolic cache (any byte may
    /// have been the target).
    pub fn write8_symbolic(&mut self, offset: ExprRef, value: ExprRef, interner: &mut Interner) -> SimpleResult<()> {
        if self.read_only {
            return Err(PanicReason::ReadOnly);
        }
        self.flush_all(interner)?;
        self.updates = self.updates.write(offset, value);
        Ok(())
    }

    /// Reset per-thread race-log touch markers (thread-local barrier).
    pub fn local_reset_race_log(&mut self) {
        self.race_log.local_reset();
    }

    /// Reset the entire race log (full-barrier reset).
    pub fn global_reset_race_log(&mut self) {
        self.race_log.global_reset();
    }
}

fn object_size_u32(size: usize) -> u32 {
    size as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryObject;

    fn fresh(size: u32) -> (ObjectState, Interner) {
        let object = Arc::new(MemoryObject::new(0x1000, size, true, false, false));
        let array = Arc::new(Array::symbolic("backing", size));
        (ObjectState::new_concrete(object, array, 0), Interner::new())
    }

    #[test]
    fn concrete_round_trip() {
        let (mut os, mut i) = fresh(4);
        let t = ThreadId::new(1);
        for (offset, byte) in [0x11u8, 0x22, 0x33, 0x44].into_iter().enumerate() {
            let v = i.const_u128(byte as u128, 8);
            os.write8(offset as u32, v, t, 0, &mut i).unwrap();
        }
        for (offset, expected) in [0x11u8, 0x22, 0x33, 0x44].into_iter().enumerate() {
            let (v, _) = os.read8(offset as u32, t, 0, &mut i).unwrap();
            assert_eq!(i.int_constant(v).unwrap().to_u128(), expected as u128);
        }
    }

    #[test]
    fn symbolic_write_then_concrete_read_selects() {
        // §8 scenario 2: a size-4 object initialised to {0x11,0x22,0x33,0x44},
        // symbolic write obj[y] = 0xFF, then a concrete read of obj[2] must
        // simplify to Select(Eq(y,2), 0xFF, 0x33).
        let (mut os, mut i) = fresh(4);
        let t = ThreadId::new(1);
        for (offset, byte) in [0x11u8, 0x22, 0x33, 0x44].into_iter().enumerate() {
            let v = i.const_u128(byte as u128, 8);
            os.write8(offset as u32, v, t, 0, &mut i).unwrap();
        }
        let y = i.test_symbol(32);
        let ff = i.const_u128(0xFF, 8);
        os.write8_symbolic(y, ff, &mut i).unwrap();
        let two = i.const_u128(2, 32);
        let read = os.read8_symbolic(two, &mut i).unwrap();
        let thirty_three = i.const_u128(0x33, 8);
        match i.get(read) {
            crate::expr::Expr::Select(cond, then_branch, else_branch) => {
                assert_eq!(*then_branch, ff);
                assert_eq!(*else_branch, thirty_three);
                match i.get(*cond) {
                    crate::expr::Expr::Eq(a, b) => {
                        assert!((*a == y && *b == two) || (*a == two && *b == y));
                    }
                    other => panic!("expected Eq condition, got {other:?}"),
                }
            }
            other => panic!("expected Select(Eq(y,2), 0xFF, 0x33), got {other:?}"),
        }
    }

    #[test]
    fn flush_is_idempotent() {
        let (mut os, mut i) = fresh(4);
        os.flush_all(&mut i).unwrap();
        let before = os.updates.clone();
        os.flush_all(&mut i).unwrap();
        assert_eq!(before, os.updates);
    }
}
