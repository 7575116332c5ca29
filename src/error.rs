//! Error taxonomy for the core.
//!
//! Mirrors the two-layer split the teacher crate uses for its interpreter
//! errors: a narrow [`PanicReason`] for pure, storage-free operations (the
//! expression IR, arrays, object-state byte access) and an outer
//! [`CoreError`] that adds the solver and internal-invariant layers described
//! by the error kinds in the specification.

use alloc::string::String;

use derive_more::Display;

/// Reason a pure operation refused to complete. Analogous to the teacher's
/// `PanicReason`, but scoped to the core's own operations rather than an ISA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PanicReason {
    /// An expression operand's width did not match the operator's signature.
    #[display(fmt = "width mismatch: expected {expected}, got {got}")]
    WidthMismatch {
        /// Width required by the operator.
        expected: u32,
        /// Width actually supplied.
        got: u32,
    },
    /// A byte offset fell outside the addressed object.
    #[display(fmt = "offset {offset} out of bounds for object of size {size}")]
    OutOfBounds {
        /// Offset that was requested.
        offset: u64,
        /// Size of the object in bytes.
        size: u64,
    },
    /// A write was attempted against a read-only object.
    #[display(fmt = "write to read-only object")]
    ReadOnly,
    /// A width was requested that is not a multiple of 8 bits (and not 1).
    #[display(fmt = "unsupported sub-byte width {0}")]
    UnsupportedWidth(u32),
    /// An array index fell outside the array's declared size.
    #[display(fmt = "array index {index} out of bounds for size {size}")]
    ArrayIndexOutOfBounds {
        /// Index that was requested.
        index: u64,
        /// Declared size of the array.
        size: u64,
    },
}

/// Result type for pure, storage-free operations.
pub type SimpleResult<T> = Result<T, PanicReason>;

/// Failure modes of the external solver façade (spec §7 kind 3).
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SolverFailure {
    /// The back-end did not respond within its allotted budget.
    #[display(fmt = "solver timed out")]
    Timeout,
    /// The back-end ran out of a tracked resource (memory, stack, licence
    /// seats, ...).
    #[display(fmt = "solver exhausted a resource: {0}")]
    ResourceExhausted(String),
    /// The back-end could not decide the query (returned `unknown`).
    #[display(fmt = "solver returned unknown")]
    Incomplete,
}

/// Top-level error surfaced by state-mutating operations.
///
/// `Panic` carries a kind-1 user-program fault together with enough context
/// for the caller to retire the state and emit a test case. `Solver` is a
/// kind-3 failure. `Bug` is a kind-5 internal invariant violation; the
/// interpreter is expected to abort rather than attempt recovery.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum CoreError {
    /// A recoverable user-program fault.
    #[display(fmt = "program fault: {0}")]
    Panic(PanicReason),
    /// The solver façade failed to answer a query.
    #[display(fmt = "solver failure: {0}")]
    Solver(SolverFailure),
    /// An internal invariant was violated; this is a bug in the core or its
    /// caller, not in the program under test.
    #[display(fmt = "internal invariant violated: {0}")]
    Bug(String),
}

impl From<PanicReason> for CoreError {
    fn from(reason: PanicReason) -> Self {
        Self::Panic(reason)
    }
}

impl From<SolverFailure> for CoreError {
    fn from(failure: SolverFailure) -> Self {
        Self::Solver(failure)
    }
}

/// Result type for operations that may surface any of the three outer error
/// kinds.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_reason_converts_into_core_error() {
        let err: CoreError = PanicReason::ReadOnly.into();
        assert_eq!(err, CoreError::Panic(PanicReason::ReadOnly));
    }

    #[test]
    fn solver_failure_converts_into_core_error() {
        let err: CoreError = SolverFailure::Timeout.into();
        assert_eq!(err, CoreError::Solver(SolverFailure::Timeout));
    }
}
