//! Processes and fork-paths (spec component C5).
//!
//! Grounded on the original implementation's `MultiProcess.h`: a process
//! owns a set of child process ids, a set of thread ids, and a per-process
//! address space, plus a fork-path recording whether each ancestor fork
//! went to parent or child.

use alloc::vec::Vec;

use crate::thread::ThreadId;

/// Process identifier. Id `1` is the conventional "init" reaper that
/// orphaned children are re-parented to (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Construct from a raw id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw numeric id.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The conventional reaper process id.
    pub const INIT: ProcessId = ProcessId(1);
}

/// One bit of a [`Process`]'s fork-path: which side of an ancestor fork
/// this process descends from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkBranch {
    /// This process is the parent side of the fork.
    Parent,
    /// This process is the child side of the fork.
    Child,
}

/// A modelled OS process: an address space, a thread-table, and process
/// hierarchy bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    /// This process's id.
    pub id: ProcessId,
    /// Parent process id; `None` only for the very first process.
    pub parent: Option<ProcessId>,
    /// Ids of processes forked from this one that have not yet been
    /// reaped.
    pub children: Vec<ProcessId>,
    /// Ids of threads belonging to this process.
    pub threads: Vec<ThreadId>,
    /// Sequence of fork choices leading from the root process to this one.
    pub fork_path: Vec<ForkBranch>,
}

impl Process {
    /// The first process in a fresh execution state: no parent, empty
    /// fork-path.
    pub fn root(id: ProcessId) -> Self {
        Self { id, parent: None, children: Vec::new(), threads: Vec::new(), fork_path: Vec::new() }
    }

    /// Construct the two descendants of a `forkProcess` call: the parent
    /// keeps `self`'s id and fork-path extended with [`ForkBranch::Parent`];
    /// the child gets `child_id` and the same prefix extended with
    /// [`ForkBranch::Child`]. Thread and address-space duplication is the
    /// caller's responsibility ([`crate::state::ExecutionState::fork_process`]),
    /// since that needs access to the owning state's copy-on-write domains.
    pub fn fork(&self, child_id: ProcessId) -> (Process, Process) {
        let mut parent_path = self.fork_path.clone();
        parent_path.push(ForkBranch::Parent);
        let mut child_path = self.fork_path.clone();
        child_path.push(ForkBranch::Child);

        let parent = Process {
            id: self.id,
            parent: self.parent,
            children: {
                let mut c = self.children.clone();
                c.push(child_id);
                c
            },
            threads: self.threads.clone(),
            fork_path: parent_path,
        };
        let child = Process {
            id: child_id,
            parent: Some(self.id),
            children: Vec::new(),
            threads: self.threads.clone(),
            fork_path: child_path,
        };
        (parent, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_extends_path_on_both_sides() {
        let root = Process::root(ProcessId::new(1));
        let (parent, child) = root.fork(ProcessId::new(2));
        assert_eq!(parent.fork_path.last(), Some(&ForkBranch::Parent));
        assert_eq!(child.fork_path.last(), Some(&ForkBranch::Child));
        assert_eq!(child.parent, Some(ProcessId::new(1)));
        assert!(parent.children.contains(&ProcessId::new(2)));
    }
}
