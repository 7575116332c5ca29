//! Copy-on-write address spaces (spec component C4).
//!
//! An address space is an ordered map from a [`MemoryObject`]'s base
//! address to its [`ObjectState`]. Write access requires the caller's
//! `cow_key` to match the object's recorded owner; a mismatch triggers a
//! lazy clone, exactly as the original implementation's
//! `AddressSpace::getWriteable` does.

use alloc::sync::Arc;

use hashbrown::HashMap;

use crate::{
    error::{
        CoreError,
        CoreResult,
    },
    memory::{
        object_state::ObjectState,
        MemoryObject,
        MemoryObjectRef,
    },
};

/// Ordered collection of objects and their per-path contents, indexed by
/// base address. One address space is owned per process (and,
/// additionally, per workgroup for data-parallel models — see §3.6).
#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    objects: HashMap<u64, (MemoryObjectRef, Arc<ObjectState>)>,
}

impl AddressSpace {
    /// An address space with no bound objects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a freshly created object into this address space.
    pub fn bind_object(&mut self, object: MemoryObjectRef, state: ObjectState) {
        self.objects.insert(object.address, (object, Arc::new(state)));
    }

    /// Remove an object from this address space (e.g. on `popFrame`'s
    /// alloca unbinding, or an explicit `free`).
    pub fn unbind_object(&mut self, object: &MemoryObject) {
        self.objects.remove(&object.address);
    }

    /// Look up the object covering `address`, if any.
    pub fn find(&self, address: u64) -> Option<&MemoryObjectRef> {
        self.resolve(address).map(|(obj, _)| obj)
    }

    fn resolve(&self, address: u64) -> Option<(&MemoryObjectRef, &Arc<ObjectState>)> {
        self.objects.values().find(|(obj, _)| obj.range().contains(&address)).map(|(o, s)| (o, s))
    }

    /// A read-only view of the object state at `address`.
    pub fn read_only(&self, address: u64) -> CoreResult<&ObjectState> {
        self.resolve(address)
            .map(|(_, state)| state.as_ref())
            .ok_or_else(|| CoreError::Bug(alloc::format!("no object bound at address {address:#x}")))
    }

    /// A writeable view of the object state at `address`, cloning it first
    /// if it is not already uniquely owned by `cow_key` (§4.4). The clone,
    /// if performed, replaces the shared entry and its `copy_on_write_owner`
    /// is updated to `cow_key`.
    pub fn writeable(&mut self, address: u64, cow_key: u64) -> CoreResult<&mut ObjectState> {
        let key = self
            .objects
            .iter()
            .find(|(_, (obj, _))| obj.range().contains(&address))
            .map(|(k, _)| *k)
            .ok_or_else(|| CoreError::Bug(alloc::format!("no object bound at address {address:#x}")))?;
        let (_, state) = self.objects.get_mut(&key).expect("key just found above");
        if Arc::strong_count(state) > 1 || state.copy_on_write_owner != cow_key {
            let mut cloned = (**state).clone();
            cloned.copy_on_write_owner = cow_key;
            *state = Arc::new(cloned);
        }
        Ok(Arc::get_mut(state).expect("uniquely owned immediately after the check above"))
    }

    /// Number of bound objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether this address space has no bound objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Produce a shallow copy of this address space for a forked state:
    /// every `ObjectState` is still shared by reference (`Arc::clone`), so
    /// the fork is O(objects) rather than O(bytes); the first write through
    /// either side triggers [`Self::writeable`]'s lazy deep clone.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Base addresses of every bound object, in no particular order.
    pub fn addresses(&self) -> impl Iterator<Item = u64> + '_ {
        self.objects.keys().copied()
    }

    /// Reset every bound object's race log (spec §3.3's local/global
    /// reset, exposed at address-space granularity for barrier release —
    /// see [`crate::state::ExecutionState::barrier`]).
    pub fn reset_race_logs(&mut self, global: bool) {
        for (_, state) in self.objects.values_mut() {
            let state = Arc::make_mut(state);
            if global {
                state.global_reset_race_log();
            } else {
                state.local_reset_race_log();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;

    fn object(addr: u64, size: u32) -> MemoryObjectRef {
        Arc::new(MemoryObject::new(addr, size, true, false, false))
    }

    #[test]
    fn fork_then_write_does_not_affect_sibling() {
        let mut space = AddressSpace::new();
        let obj = object(0x1000, 4);
        let array = Arc::new(Array::symbolic("backing", 4));
        space.bind_object(obj.clone(), ObjectState::new_concrete(obj.clone(), array, 0));

        let mut forked = space.fork();
        {
            let state = forked.writeable(0x1000, 1).unwrap();
            state.read_only = true; // any mutation suffices for this check
        }
        let original = space.read_only(0x1000).unwrap();
        assert!(!original.read_only);
    }

    #[test]
    fn writeable_is_idempotent_once_owned() {
        let mut space = AddressSpace::new();
        let obj = object(0x2000, 4);
        let array = Arc::new(Array::symbolic("backing", 4));
        space.bind_object(obj.clone(), ObjectState::new_concrete(obj, array, 7));
        let first_ptr = space.writeable(0x2000, 7).unwrap() as *mut ObjectState;
        let second_ptr = space.writeable(0x2000, 7).unwrap() as *mut ObjectState;
        assert_eq!(first_ptr, second_ptr);
    }
}
