//! Engine-wide configuration.
//!
//! Grounded on the teacher's `InterpreterParams`: a single explicit struct
//! threaded through constructors, with a `Default` impl and `From` adapters,
//! rather than global mutable flags.

use crate::consts::{
    DEFAULT_ADDRESS_POOL_ALIGN,
    DEFAULT_ADDRESS_POOL_GAP,
    DEFAULT_ADDRESS_POOL_SIZE,
    DEFAULT_ADDRESS_POOL_START,
};

/// Tunables that change the core's behaviour without changing its
/// semantics: allocation geometry, optimisation toggles, and deterministic
/// replay knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreOptions {
    /// Base address handed to a fresh [`crate::address_pool::AddressPool`].
    pub address_pool_start: u64,
    /// Total size of the address pool's backing region.
    pub address_pool_size: u64,
    /// Gap inserted between successive allocations.
    pub address_pool_gap: u64,
    /// Alignment applied to every allocation.
    pub address_pool_align: u64,
    /// When set, arrays whose entire contents are constant are represented
    /// without an update-list overlay until first write (§9 "const-array
    /// opt").
    pub const_array_optimization: bool,
    /// When set, `UDiv`/`SDiv`/`URem`/`SRem` by a power-of-two constant
    /// divisor are rewritten to shifts/masks during `create`.
    pub optimize_divides: bool,
    /// Epoch (in whatever unit the caller's virtual clock uses) that a
    /// fresh [`crate::state::ExecutionState`]'s clock starts counting from.
    /// Resolves the specification's "setupTime" open question: the clock is
    /// an engine-supplied constant, not the host wall clock, so replay is
    /// deterministic.
    pub virtual_clock_epoch: u64,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            address_pool_start: DEFAULT_ADDRESS_POOL_START,
            address_pool_size: DEFAULT_ADDRESS_POOL_SIZE,
            address_pool_gap: DEFAULT_ADDRESS_POOL_GAP,
            address_pool_align: DEFAULT_ADDRESS_POOL_ALIGN,
            const_array_optimization: true,
            optimize_divides: true,
            virtual_clock_epoch: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_original_pool_geometry() {
        let opts = CoreOptions::default();
        assert_eq!(opts.address_pool_start, 0xDEAD_BEEF_0000_0000);
        assert_eq!(opts.address_pool_size, 0x1000_0000);
        assert_eq!(opts.address_pool_gap, 32);
        assert_eq!(opts.address_pool_align, 32);
    }
}
