//! Arrays and update lists (spec component C2).
//!
//! An [`Array`] is a named, byte-valued, 32-bit-indexed table; an
//! [`UpdateList`] bundles an array with a (possibly empty) chain of writes
//! layered on top, newest first. Two update lists compare equal exactly
//! when they share the same array and the same head node — this is what
//! lets [`crate::memory::object_state::ObjectState`] detect "nothing has
//! been written since the last flush" for free via `Eq`.

use alloc::{
    string::String,
    sync::Arc,
    vec::Vec,
};

use crate::expr::ExprRef;

/// A symbolic or constant byte-valued lookup table of fixed size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array {
    /// Name used purely for diagnostics and test-case labelling.
    pub name: String,
    /// Size in bytes.
    pub size: u32,
    /// `Some` for a constant array (the initial contents); `None` for a
    /// fully symbolic array.
    pub constant_values: Option<Vec<u8>>,
}

impl Array {
    /// A fresh, fully symbolic array of `size` bytes.
    pub fn symbolic(name: impl Into<String>, size: u32) -> Self {
        Self { name: name.into(), size, constant_values: None }
    }

    /// A constant array initialised from `values`; `values.len()` becomes
    /// the array's size.
    pub fn constant(name: impl Into<String>, values: Vec<u8>) -> Self {
        let size = values.len() as u32;
        Self { name: name.into(), size, constant_values: Some(values) }
    }

    /// Whether this array was created with initial concrete contents.
    pub fn is_constant(&self) -> bool {
        self.constant_values.is_some()
    }
}

/// One write layered on top of an array: `array[index] = value` (a
/// width-32 index expression, a width-8 value expression), plus the older
/// node it was layered on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateNode {
    /// Width-32 index expression.
    pub index: ExprRef,
    /// Width-8 value expression.
    pub value: ExprRef,
    /// The node this one was written on top of, if any.
    pub next: Option<Arc<UpdateNode>>,
}

/// An [`Array`] plus a (possibly empty) history of writes, newest first.
/// Equality is by `(array, head)` identity, not by replaying the write
/// history — exactly the comparison [`crate::memory::object_state`] needs to
/// tell "no writes occurred since this list was captured".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateList {
    /// The underlying array.
    pub array: Arc<Array>,
    /// Most recent write, if any.
    pub head: Option<Arc<UpdateNode>>,
}

impl UpdateList {
    /// An update list with no writes layered on `array`.
    pub fn fresh(array: Arc<Array>) -> Self {
        Self { array, head: None }
    }

    /// Layer a new write on top of this list, returning the updated list.
    /// The receiver is left untouched (update lists are immutable values;
    /// callers hold onto old lists as long as they like).
    pub fn write(&self, index: ExprRef, value: ExprRef) -> Self {
        let node = UpdateNode { index, value, next: self.head.clone() };
        Self { array: self.array.clone(), head: Some(Arc::new(node)) }
    }

    /// Number of writes layered on top of the array's initial contents.
    pub fn depth(&self) -> usize {
        let mut count = 0;
        let mut cur = self.head.as_ref();
        while let Some(node) = cur {
            count += 1;
            cur = node.next.as_ref();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_ref(n: u32) -> ExprRef {
        // ExprRef has no public constructor outside `expr`; tests here only
        // need distinct, comparable handles, which index equality provides
        // via the crate-visible representation exercised through `expr`'s
        // own tests. We fabricate one via transmute-free round trip: build
        // through an Interner instead.
        let mut interner = crate::expr::Interner::new();
        interner.const_u128(n as u128, 32)
    }

    #[test]
    fn update_lists_compare_by_head_identity() {
        let array = Arc::new(Array::symbolic("a", 16));
        let base = UpdateList::fresh(array.clone());
        let idx = dummy_ref(0);
        let val = dummy_ref(1);
        let written = base.write(idx, val);
        assert_ne!(base, written);
        assert_eq!(written, written.clone());
    }

    #[test]
    fn depth_counts_layered_writes() {
        let array = Arc::new(Array::symbolic("a", 16));
        let list = UpdateList::fresh(array);
        let list = list.write(dummy_ref(0), dummy_ref(1));
        let list = list.write(dummy_ref(2), dummy_ref(3));
        assert_eq!(list.depth(), 2);
    }
}
