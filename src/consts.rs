//! Crate-wide constants.

/// Default gap (in bytes) inserted between successive [`crate::address_pool::AddressPool`]
/// allocations, mirroring the original implementation's
/// `4 * sizeof(uint64_t)`.
pub const DEFAULT_ADDRESS_POOL_GAP: u64 = 4 * core::mem::size_of::<u64>() as u64;

/// Default alignment (in bytes) for [`crate::address_pool::AddressPool`] allocations.
pub const DEFAULT_ADDRESS_POOL_ALIGN: u64 = 4 * core::mem::size_of::<u64>() as u64;

/// Default base address of the pool, matching the original implementation's
/// `0xDEADBEEF00000000`.
pub const DEFAULT_ADDRESS_POOL_START: u64 = 0xDEAD_BEEF_0000_0000;

/// Default size of the pool, matching the original implementation's
/// `0x10000000` (256 MiB).
pub const DEFAULT_ADDRESS_POOL_SIZE: u64 = 0x1000_0000;

/// Thread id reserved for the engine's own setup phase; touches logged under
/// this id are exempt from race reporting (§4.3 of the design).
pub const SETUP_THREAD_ID: u32 = 0;

/// Maximum integer bit-vector width directly representable inline (without
/// falling back to a limb vector).
pub const INLINE_BITVECTOR_WIDTH: u32 = 128;
