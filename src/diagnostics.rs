//! Diagnostics stream.
//!
//! Grounded directly on the teacher's `profiler::ProfileReceiver` /
//! `StderrReceiver` pair: a cloneable trait object is notified whenever the
//! engine retires a state, alongside `tracing` events for operators who only
//! attach a subscriber. Generalised from "per-transaction profiling" to
//! "per-state diagnostics" (§7 of the design).

use alloc::{
    string::String,
    vec::Vec,
};

#[cfg(feature = "profile-any")]
use dyn_clone::DynClone;

use crate::{
    backtrace::StackTrace,
    error::{
        PanicReason,
        SolverFailure,
    },
    thread::ThreadId,
};

/// A single notable event surfaced while exploring one execution state.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// Kind-1: a user-program fault retired the state.
    Fault {
        /// Reason execution could not continue.
        reason: PanicReason,
        /// Call stack at the faulting instruction.
        trace: StackTrace,
    },
    /// Kind-3: the solver façade could not answer a query; the state was
    /// abandoned.
    SolverFailed(SolverFailure),
    /// Kind-4: a data race was detected; execution continues.
    Race {
        /// Byte offset (within its object) the race occurred at.
        offset: u64,
        /// First thread involved in the race.
        first: ThreadId,
        /// Second thread involved in the race.
        second: ThreadId,
        /// Human-readable classification ("read-after-write", ...).
        kind: String,
    },
}

/// Receiver of [`DiagnosticEvent`]s. Mirrors `ProfileReceiver`'s shape:
/// cloneable (so a state fork can clone its receiver), and callable with a
/// `&mut self` so implementations may accumulate without interior
/// mutability.
#[cfg(feature = "profile-any")]
pub trait DiagnosticsReceiver: DynClone {
    /// Called once per event, in the order the events occurred.
    fn on_event(&mut self, event: &DiagnosticEvent);
}

#[cfg(feature = "profile-any")]
dyn_clone::clone_trait_object!(DiagnosticsReceiver);

/// Minimal receiver used when the `profile-any` feature is disabled: a
/// plain function pointer is enough, matching the teacher's placeholder
/// fallback for `profiler` when no profiling feature is active.
#[cfg(not(feature = "profile-any"))]
pub trait DiagnosticsReceiver {
    /// Called once per event, in the order the events occurred.
    fn on_event(&mut self, event: &DiagnosticEvent);
}

/// Default receiver: logs through `tracing` and, when `std` is available,
/// also echoes to stderr — the same two-tier behaviour as the teacher's
/// `StderrReceiver`.
#[derive(Debug, Clone, Default)]
pub struct StderrReceiver {
    events: Vec<DiagnosticEvent>,
}

impl StderrReceiver {
    /// Events observed so far, oldest first.
    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }
}

impl DiagnosticsReceiver for StderrReceiver {
    fn on_event(&mut self, event: &DiagnosticEvent) {
        match event {
            DiagnosticEvent::Fault { reason, .. } => {
                tracing::warn!(?reason, "state retired on program fault");
            }
            DiagnosticEvent::SolverFailed(failure) => {
                tracing::warn!(?failure, "solver failure, abandoning state");
            }
            DiagnosticEvent::Race { offset, first, second, kind } => {
                tracing::warn!(offset, ?first, ?second, %kind, "data race detected");
            }
        }
        #[cfg(feature = "std")]
        std::eprintln!("{event:?}");
        self.events.push(event.clone());
    }
}
