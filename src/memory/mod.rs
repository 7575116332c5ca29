//! Memory objects, object states, and address spaces (spec components C3,
//! C4).

pub mod address_space;
pub mod object_state;
pub mod race;

use alloc::{
    string::String,
    sync::Arc,
    vec::Vec,
};
use core::sync::atomic::{
    AtomicU32,
    Ordering as AtomicOrdering,
};

use crate::expr::ExprRef;

static NEXT_OBJECT_ID: AtomicU32 = AtomicU32::new(1);

/// Stable identity of a backing region. Immutable once created; the
/// mutable contents on one execution path live in the companion
/// [`object_state::ObjectState`].
///
/// Grounded directly on the original implementation's `MemoryObject`
/// (`lib/Core/Memory.h`): a process-wide id counter, base address, size
/// and flags, with allocation-site metadata kept as an opaque identifier
/// rather than a pointer into a host compiler's IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    /// Process-wide unique id, assigned at construction.
    pub id: u32,
    /// Base address in the modelled address space.
    pub address: u64,
    /// Size in bytes.
    pub size: u32,
    /// Diagnostic name; defaults to `"unnamed"`.
    pub name: String,
    /// Allocated on a thread's stack (as opposed to the heap or globals).
    pub is_local: bool,
    /// A global (whole-program-lifetime) allocation.
    pub is_global: bool,
    /// Address is fixed rather than chosen by the address pool.
    pub is_fixed: bool,
    /// Allocated internally by the engine rather than by the program under
    /// test (e.g. argv/environ backing storage).
    pub is_fake: bool,
    /// Created in response to an explicit user/test-harness request.
    pub is_user_specified: bool,
    /// Opaque identifier of the instruction or declaration this object was
    /// allocated for; purely for diagnostics.
    pub alloc_site: Option<u64>,
    /// Constraints the user has requested hold of any counter-example
    /// generated against this object.
    pub cex_preferences: Vec<ExprRef>,
}

impl MemoryObject {
    /// Allocate a fresh id and construct an object descriptor.
    pub fn new(address: u64, size: u32, is_local: bool, is_global: bool, is_fixed: bool) -> Self {
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, AtomicOrdering::Relaxed),
            address,
            size,
            name: String::from("unnamed"),
            is_local,
            is_global,
            is_fixed,
            is_fake: false,
            is_user_specified: false,
            alloc_site: None,
            cex_preferences: Vec::new(),
        }
    }

    /// Half-open byte range `[address, address + size)`.
    pub fn range(&self) -> core::ops::Range<u64> {
        self.address..self.address + self.size as u64
    }
}

/// Shared handle to a [`MemoryObject`]; address spaces key on this.
pub type MemoryObjectRef = Arc<MemoryObject>;
