//! Symbolic-state core for a multi-threaded symbolic execution engine.
//!
//! This crate is a library of primitives — never a driver loop. An external
//! executor steps a translated program one instruction at a time and calls
//! into the types exported here: [`expr`] for the hash-consed expression IR,
//! [`memory`] for per-object byte storage and copy-on-write address spaces,
//! [`thread`]/[`process`] for cooperative scheduling, [`state`] for the
//! per-path snapshot that is forked on every branch, and [`constraints`] /
//! [`solver`] / [`fp_rewrite`] for the constraint set and its floating-point
//! rewriting front-end.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod address_pool;
pub mod array;
pub mod backtrace;
pub mod config;
pub mod consts;
pub mod constraints;
pub mod diagnostics;
pub mod error;
pub mod expr;
pub mod fp_rewrite;
pub mod frontend;
pub mod memory;
pub mod posix;
pub mod process;
pub mod simd;
pub mod solver;
pub mod state;
pub mod thread;

/// Re-exports of the most commonly used types, mirroring the flat `prelude`
/// module teachers in this codebase ship alongside a deep module tree.
pub mod prelude {
    pub use crate::{
        address_pool::{
            AddressPool,
            AddressPoolError,
        },
        array::{
            Array,
            UpdateList,
            UpdateNode,
        },
        config::CoreOptions,
        constraints::ConstraintManager,
        diagnostics::{
            DiagnosticEvent,
            DiagnosticsReceiver,
            StderrReceiver,
        },
        error::{
            CoreError,
            CoreResult,
            PanicReason,
            SimpleResult,
        },
        expr::{
            Expr,
            ExprRef,
            FpSemantics,
            Width,
        },
        memory::{
            address_space::AddressSpace,
            object_state::ObjectState,
            MemoryObject,
        },
        process::{
            Process,
            ProcessId,
        },
        solver::{
            Query,
            QueryResult,
            SolverBackend,
        },
        state::ExecutionState,
        thread::{
            StackFrame,
            Thread,
            ThreadId,
            WaitListId,
        },
    };
}
