//! Per-path execution snapshot (spec component C6).
//!
//! An [`ExecutionState`] is everything forked when the engine explores a
//! branch: the constraint set, the thread and process tables, the waiting
//! lists threads park on, the three copy-on-write address-space domains
//! (per-process, per-thread, per-workgroup) and the address pool they draw
//! from. Forking (`branch`, `fork_process`) is O(threads + processes): the
//! address spaces themselves are shared by reference until the first write
//! through either side forces `AddressSpace::writeable`'s lazy clone.

use alloc::{
    format,
    string::String,
    vec::Vec,
};

use hashbrown::{
    HashMap,
    HashSet,
};

use crate::{
    address_pool::AddressPool,
    backtrace::StackTrace,
    config::CoreOptions,
    constraints::ConstraintManager,
    diagnostics::DiagnosticEvent,
    error::{
        CoreError,
        CoreResult,
        PanicReason,
    },
    expr::{
        Builder,
        Expr,
        ExprRef,
        Interner,
        Width,
    },
    frontend::InstructionId,
    memory::{
        address_space::AddressSpace,
        object_state::ObjectState,
        race::MemoryRace,
        MemoryObject,
        MemoryObjectRef,
    },
    process::{
        Process,
        ProcessId,
    },
    solver::SolverBackend,
    thread::{
        StackFrame,
        Thread,
        ThreadId,
        WaitListId,
    },
};

/// Which of the three copy-on-write domains an address-space operation
/// targets (spec §3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpaceKind {
    /// The address space shared by every thread of a process.
    Process(ProcessId),
    /// An address space private to one thread (e.g. its own stack-object
    /// bindings, where the front-end models them as separate objects
    /// rather than `StackFrame::allocas`).
    Thread(ThreadId),
    /// An address space shared by every thread of one workgroup, for
    /// data-parallel models (local/shared memory).
    Workgroup(u32),
}

/// A fully self-contained execution path: constraints, schedulable
/// threads and processes, and the memory each can see.
pub struct ExecutionState<S> {
    constraints: ConstraintManager<S>,
    processes: HashMap<ProcessId, Process>,
    threads: HashMap<ThreadId, Thread>,
    wait_lists: HashMap<WaitListId, Vec<ThreadId>>,
    next_wait_list: u64,
    next_process_id: u32,
    next_thread_id: u32,
    scheduled: Option<ThreadId>,
    depth: u64,
    weight: f64,
    clock: u64,
    cow_key: u64,
    process_spaces: HashMap<ProcessId, AddressSpace>,
    thread_spaces: HashMap<ThreadId, AddressSpace>,
    workgroup_spaces: HashMap<u32, AddressSpace>,
    address_pool: AddressPool,
    diagnostics: Vec<DiagnosticEvent>,
}

impl<S: SolverBackend> ExecutionState<S> {
    /// A fresh root state with a single process (id 1) and a single
    /// thread running `entry` from `entry_pc`.
    pub fn new(options: &CoreOptions, solver: S, entry: StackFrame, entry_pc: InstructionId) -> CoreResult<Self> {
        let pool = AddressPool::from_options(options)
            .map_err(|_| CoreError::Bug(String::from("invalid address pool geometry in CoreOptions")))?;

        let pid = ProcessId::INIT;
        let tid = ThreadId::new(1);
        let mut process = Process::root(pid);
        process.threads.push(tid);
        let thread = Thread::new(tid, pid, 0, entry, entry_pc);

        let mut processes = HashMap::new();
        processes.insert(pid, process);
        let mut threads = HashMap::new();
        threads.insert(tid, thread);
        let mut process_spaces = HashMap::new();
        process_spaces.insert(pid, AddressSpace::new());

        Ok(Self {
            constraints: ConstraintManager::new(solver),
            processes,
            threads,
            wait_lists: HashMap::new(),
            next_wait_list: 0,
            next_process_id: 2,
            next_thread_id: 2,
            scheduled: Some(tid),
            depth: 0,
            weight: 1.0,
            clock: options.virtual_clock_epoch,
            cow_key: 0,
            process_spaces,
            thread_spaces: HashMap::new(),
            workgroup_spaces: HashMap::new(),
            address_pool: pool,
            diagnostics: Vec::new(),
        })
    }

    /// The path's accumulated constraint set.
    pub fn constraints(&self) -> &ConstraintManager<S> {
        &self.constraints
    }

    /// The path's accumulated constraint set, mutably.
    pub fn constraints_mut(&mut self) -> &mut ConstraintManager<S> {
        &mut self.constraints
    }

    /// The currently scheduled thread, if the scheduler has picked one.
    pub fn scheduled_thread(&self) -> Option<ThreadId> {
        self.scheduled
    }

    /// Look up a thread by id.
    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    /// Look up a thread by id, mutably.
    pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(&id)
    }

    /// Look up a process by id.
    pub fn process(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    /// Exploration depth: the number of branch points taken to reach this
    /// state from the root.
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// This path's share of the root state's total weight (halved at
    /// every branch; see [`Self::branch`]).
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Current value of the per-state virtual clock.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Advance the virtual clock by `delta` (e.g. on a `rdtsc`-like
    /// instruction or a scheduler quantum).
    pub fn advance_clock(&mut self, delta: u64) {
        self.clock += delta;
    }

    /// Diagnostic events (faults, solver failures, races) recorded on
    /// this path so far.
    pub fn diagnostics(&self) -> &[DiagnosticEvent] {
        &self.diagnostics
    }

    /// Remove and return every diagnostic event recorded so far.
    pub fn take_diagnostics(&mut self) -> Vec<DiagnosticEvent> {
        core::mem::take(&mut self.diagnostics)
    }

    /// Record a fault for diagnostics, capturing the faulting thread's
    /// stack trace.
    pub fn record_fault(&mut self, reason: PanicReason, thread: ThreadId, fault_pc: InstructionId) {
        let trace = self
            .threads
            .get(&thread)
            .map(|t| StackTrace::capture(t, fault_pc))
            .unwrap_or_default();
        tracing::warn!(?reason, thread = thread.raw(), depth = trace.depth(), "execution fault");
        self.diagnostics.push(DiagnosticEvent::Fault { reason, trace });
    }

    /// Allocate a fresh waiting list, assigned monotonically (spec §3.5:
    /// "assigned monotonically by `ExecutionState::new_wait_list`").
    pub fn new_wait_list(&mut self) -> WaitListId {
        let id = WaitListId::new(self.next_wait_list);
        self.next_wait_list += 1;
        self.wait_lists.insert(id, Vec::new());
        id
    }

    /// Create a new thread in `process`, initially enabled and scheduled
    /// nowhere in particular (the caller decides whether to `schedule`
    /// it immediately).
    pub fn spawn_thread(
        &mut self,
        process: ProcessId,
        workgroup: u32,
        entry: StackFrame,
        pc: InstructionId,
    ) -> CoreResult<ThreadId> {
        let proc = self
            .processes
            .get_mut(&process)
            .ok_or_else(|| CoreError::Bug(format!("unknown process {process:?}")))?;
        let tid = ThreadId::new(self.next_thread_id);
        self.next_thread_id += 1;
        proc.threads.push(tid);
        self.threads.insert(tid, Thread::new(tid, process, workgroup, entry, pc));
        Ok(tid)
    }

    /// Put `thread` to sleep on `wlist`, removing it from scheduling
    /// consideration until a matching `notify_one`/`notify_all` wakes it.
    pub fn sleep(&mut self, thread: ThreadId, wlist: WaitListId) -> CoreResult<()> {
        let t = self
            .threads
            .get_mut(&thread)
            .ok_or_else(|| CoreError::Bug(format!("unknown thread {thread:?}")))?;
        t.sleep(wlist);
        self.wait_lists.entry(wlist).or_default().push(thread);
        if self.scheduled == Some(thread) {
            self.scheduled = None;
        }
        Ok(())
    }

    /// Wake a single thread waiting on `wlist`. No-op if `thread` is not
    /// currently on that list.
    pub fn notify_one(&mut self, wlist: WaitListId, thread: ThreadId) -> CoreResult<()> {
        let list = self
            .wait_lists
            .get_mut(&wlist)
            .ok_or_else(|| CoreError::Bug(format!("unknown waiting list {wlist:?}")))?;
        if let Some(pos) = list.iter().position(|&t| t == thread) {
            list.remove(pos);
            self.threads
                .get_mut(&thread)
                .expect("a waiting thread must be registered in the thread table")
                .wake();
        }
        Ok(())
    }

    /// Wake every thread waiting on `wlist`.
    pub fn notify_all(&mut self, wlist: WaitListId) -> CoreResult<()> {
        let list = self
            .wait_lists
            .get_mut(&wlist)
            .ok_or_else(|| CoreError::Bug(format!("unknown waiting list {wlist:?}")))?;
        let woken = core::mem::take(list);
        for tid in woken {
            if let Some(t) = self.threads.get_mut(&tid) {
                t.wake();
            }
        }
        Ok(())
    }

    /// Clear the scheduled-thread pointer, forcing the caller to
    /// `schedule` an explicit successor before execution continues.
    pub fn preempt(&mut self) {
        self.scheduled = None;
    }

    /// Schedule `thread` to run next. Errors if the thread is disabled
    /// (terminated).
    pub fn schedule(&mut self, thread: ThreadId) -> CoreResult<()> {
        let t = self
            .threads
            .get(&thread)
            .ok_or_else(|| CoreError::Bug(format!("unknown thread {thread:?}")))?;
        if !t.enabled {
            return Err(CoreError::Bug(format!("cannot schedule disabled thread {thread:?}")));
        }
        self.scheduled = Some(thread);
        Ok(())
    }

    /// Barrier synchronisation across `n` participants on `wlist` (spec
    /// §4.5). Returns `true` if this call was the `n`th arrival (the
    /// round released: every waiter woken, `space`'s race log reset) or
    /// `false` if `thread` now blocks waiting for the rest. Because a
    /// released round always empties its waiting list before returning,
    /// a subsequent call naturally starts a fresh round rather than
    /// needing separately tracked re-arming state (§4.5.1).
    pub fn barrier(
        &mut self,
        wlist: WaitListId,
        n: usize,
        thread: ThreadId,
        space: AddressSpaceKind,
        is_global: bool,
    ) -> CoreResult<bool> {
        let waiting = self.wait_lists.entry(wlist).or_default();
        if waiting.len() + 1 >= n {
            let woken = core::mem::take(waiting);
            for tid in woken {
                if let Some(t) = self.threads.get_mut(&tid) {
                    t.wake();
                }
            }
            if let Some(t) = self.threads.get_mut(&thread) {
                t.wake();
            }
            if let Some(as_) = self.address_space_opt_mut(space) {
                as_.reset_race_logs(is_global);
            }
            Ok(true)
        } else {
            waiting.push(thread);
            if let Some(t) = self.threads.get_mut(&thread) {
                t.sleep(wlist);
            }
            if self.scheduled == Some(thread) {
                self.scheduled = None;
            }
            Ok(false)
        }
    }

    /// Fork a child process from `parent` (spec §4.4): the child gets a
    /// fresh [`ProcessId`], a copy-on-write duplicate of the parent's
    /// process-image address space, and a duplicate of every thread the
    /// parent currently has (each under a fresh [`ThreadId`], since
    /// thread ids are unique across the whole state rather than scoped
    /// per-process). Returns `(parent_id, child_id)`.
    pub fn fork_process(&mut self, parent: ProcessId) -> CoreResult<(ProcessId, ProcessId)> {
        let child_pid = ProcessId::new(self.next_process_id);
        self.next_process_id += 1;

        let parent_proc = self
            .processes
            .get(&parent)
            .cloned()
            .ok_or_else(|| CoreError::Bug(format!("unknown process {parent:?}")))?;
        let (updated_parent, mut child) = parent_proc.fork(child_pid);

        self.cow_key += 1;
        if let Some(space) = self.process_spaces.get(&parent) {
            let forked = space.fork();
            self.process_spaces.insert(child_pid, forked);
        }

        let mut child_threads = Vec::with_capacity(updated_parent.threads.len());
        for &tid in &updated_parent.threads {
            let mut cloned = self
                .threads
                .get(&tid)
                .cloned()
                .ok_or_else(|| CoreError::Bug(format!("unknown thread {tid:?}")))?;
            let new_tid = ThreadId::new(self.next_thread_id);
            self.next_thread_id += 1;
            cloned.id = new_tid;
            cloned.process = child_pid;
            if let Some(space) = self.thread_spaces.get(&tid) {
                self.thread_spaces.insert(new_tid, space.fork());
            }
            self.threads.insert(new_tid, cloned);
            child_threads.push(new_tid);
        }
        child.threads = child_threads;

        self.processes.insert(parent, updated_parent);
        self.processes.insert(child_pid, child);
        Ok((parent, child_pid))
    }

    /// Terminate `process`: disable all its threads and re-parent its
    /// children to the root process (id 1). If `reaper_wait_list` is
    /// given, every thread waiting on it (conventionally, a parent
    /// blocked reaping its children) is woken.
    pub fn terminate_process(&mut self, process: ProcessId, reaper_wait_list: Option<WaitListId>) -> CoreResult<()> {
        let proc = self
            .processes
            .remove(&process)
            .ok_or_else(|| CoreError::Bug(format!("unknown process {process:?}")))?;
        for tid in &proc.threads {
            if let Some(t) = self.threads.get_mut(tid) {
                t.terminate();
            }
        }
        if process != ProcessId::INIT {
            for &child in &proc.children {
                if let Some(child_proc) = self.processes.get_mut(&child) {
                    child_proc.parent = Some(ProcessId::INIT);
                }
            }
            if let Some(init_proc) = self.processes.get_mut(&ProcessId::INIT) {
                init_proc.children.extend(proc.children.iter().copied());
            }
        }
        if let Some(wlist) = reaper_wait_list {
            self.notify_all(wlist)?;
        }
        Ok(())
    }

    /// Fork the whole state for a branch (spec §4.1/§4.6): constraints,
    /// thread and process tables, and every address space are
    /// duplicated O(threads + processes) by bumping the copy-on-write
    /// key, not by deep-copying memory. This path's weight is halved;
    /// the returned state gets the remainder.
    pub fn branch(&mut self) -> Self
    where
        S: Clone,
    {
        self.cow_key += 1;
        self.depth += 1;
        let child_weight = self.weight - self.weight / 2.0;
        self.weight -= child_weight;
        Self {
            constraints: self.constraints.clone(),
            processes: self.processes.clone(),
            threads: self.threads.clone(),
            wait_lists: self.wait_lists.clone(),
            next_wait_list: self.next_wait_list,
            next_process_id: self.next_process_id,
            next_thread_id: self.next_thread_id,
            scheduled: self.scheduled,
            depth: self.depth,
            weight: child_weight,
            clock: self.clock,
            cow_key: self.cow_key,
            process_spaces: fork_space_map(&self.process_spaces),
            thread_spaces: fork_space_map(&self.thread_spaces),
            workgroup_spaces: fork_space_map(&self.workgroup_spaces),
            address_pool: self.address_pool.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    fn address_space_mut(&mut self, kind: AddressSpaceKind) -> &mut AddressSpace {
        match kind {
            AddressSpaceKind::Process(pid) => self.process_spaces.entry(pid).or_default(),
            AddressSpaceKind::Thread(tid) => self.thread_spaces.entry(tid).or_default(),
            AddressSpaceKind::Workgroup(wg) => self.workgroup_spaces.entry(wg).or_default(),
        }
    }

    fn address_space_opt_mut(&mut self, kind: AddressSpaceKind) -> Option<&mut AddressSpace> {
        match kind {
            AddressSpaceKind::Process(pid) => self.process_spaces.get_mut(&pid),
            AddressSpaceKind::Thread(tid) => self.thread_spaces.get_mut(&tid),
            AddressSpaceKind::Workgroup(wg) => self.workgroup_spaces.get_mut(&wg),
        }
    }

    /// Bind a freshly allocated object into the given address-space
    /// domain.
    pub fn bind_object(&mut self, kind: AddressSpaceKind, object: MemoryObjectRef, state: ObjectState) {
        self.address_space_mut(kind).bind_object(object, state);
    }

    /// Unbind an object (e.g. on `popFrame`'s alloca teardown, or a
    /// `free`).
    pub fn unbind_object(&mut self, kind: AddressSpaceKind, object: &MemoryObject) {
        self.address_space_mut(kind).unbind_object(object);
    }

    /// Allocate `len` bytes from this path's address pool (§C8),
    /// returning the sentinel `0` on exhaustion.
    pub fn allocate_address(&mut self, len: u64) -> u64 {
        self.address_pool.allocate(len)
    }

    /// Read `width` bits at `address` (spec §4.2), logging any detected
    /// race into [`Self::diagnostics`].
    pub fn read(
        &mut self,
        kind: AddressSpaceKind,
        address: u64,
        width: Width,
        thread: ThreadId,
        workgroup: u32,
        interner: &mut Interner,
    ) -> CoreResult<ExprRef> {
        let cow_key = self.cow_key;
        let space = self.address_space_mut(kind);
        let state = space.writeable(address, cow_key)?;
        let offset = (address - state.object().address) as u32;
        let (value, races) = state.read(offset, width, thread, workgroup, interner)?;
        self.record_races(offset, races);
        Ok(value)
    }

    /// Write `width` bits of `value` at `address`, logging any detected
    /// race.
    pub fn write(
        &mut self,
        kind: AddressSpaceKind,
        address: u64,
        value: ExprRef,
        width: Width,
        thread: ThreadId,
        workgroup: u32,
        interner: &mut Interner,
    ) -> CoreResult<()> {
        let cow_key = self.cow_key;
        let space = self.address_space_mut(kind);
        let state = space.writeable(address, cow_key)?;
        let offset = (address - state.object().address) as u32;
        let races = state.write(offset, value, width, thread, workgroup, interner)?;
        self.record_races(offset, races);
        Ok(())
    }

    /// Read one byte at a symbolic offset expression within the object
    /// covering `address` (§4.2). Forces a full flush of that object.
    pub fn read_symbolic(
        &mut self,
        kind: AddressSpaceKind,
        address: u64,
        offset: ExprRef,
        interner: &mut Interner,
    ) -> CoreResult<ExprRef> {
        let cow_key = self.cow_key;
        let space = self.address_space_mut(kind);
        let state = space.writeable(address, cow_key)?;
        Ok(state.read8_symbolic(offset, interner)?)
    }

    /// Write one byte at a symbolic offset expression.
    pub fn write_symbolic(
        &mut self,
        kind: AddressSpaceKind,
        address: u64,
        offset: ExprRef,
        value: ExprRef,
        interner: &mut Interner,
    ) -> CoreResult<()> {
        let cow_key = self.cow_key;
        let space = self.address_space_mut(kind);
        let state = space.writeable(address, cow_key)?;
        state.write8_symbolic(offset, value, interner)?;
        Ok(())
    }

    fn record_races(&mut self, offset: u32, races: impl IntoIterator<Item = MemoryRace>) {
        for race in races {
            let kind = format!("{:?}", race.kind);
            tracing::warn!(first = race.first.raw(), second = race.second.raw(), kind = %kind, "data race detected");
            self.diagnostics.push(DiagnosticEvent::Race { offset: offset as u64, first: race.first, second: race.second, kind });
        }
    }

    /// Attempt to merge `other` into `self` in place (spec §4.9).
    /// Refuses (returning `Ok(false)`, leaving `self` untouched and
    /// dropping `other`) unless: both states have the same scheduled
    /// thread at the same program counter, every thread present in both
    /// has an identical call-stack shape (same function/module at every
    /// frame), every address-space domain binds the same set of objects
    /// on both sides, and the constraint suffix distinguishing the two
    /// paths contains no floating-point comparison (§4.7's rewriter
    /// cannot fold an `ite` across those). This is an approximation of
    /// the original "symbolic input order" check: rather than tracking a
    /// separate ledger of array-creation order, it relies on the stack
    /// and binding equality above to rule out paths that diverged before
    /// introducing the same symbolic inputs.
    pub fn merge(&mut self, mut other: Self, interner: &mut Interner) -> CoreResult<bool>
    where
        S: Clone,
    {
        if !Self::mergeable(self, &other) {
            return Ok(false);
        }

        let a_suffix = suffix(self.constraints.constraints(), other.constraints.constraints());
        let b_suffix = suffix(other.constraints.constraints(), self.constraints.constraints());
        if a_suffix.iter().chain(b_suffix.iter()).any(|&e| is_fp_comparison(interner, e)) {
            return Ok(false);
        }

        let in_a = conjunction(interner, &a_suffix)?;
        let in_b = conjunction(interner, &b_suffix)?;

        let thread_ids: Vec<ThreadId> = self.threads.keys().copied().collect();
        for tid in thread_ids {
            let Some(other_thread) = other.threads.get(&tid) else { continue };
            let other_frames = other_thread.stack.clone();
            let self_thread = self.threads.get_mut(&tid).expect("checked present above");
            for (frame_a, frame_b) in self_thread.stack.iter_mut().zip(other_frames.iter()) {
                for (reg_a, reg_b) in frame_a.registers.iter_mut().zip(frame_b.registers.iter()) {
                    if *reg_a != *reg_b {
                        *reg_a = interner.create(Builder::Select(in_a, *reg_a, *reg_b))?;
                    }
                }
            }
        }

        let cow_key = self.cow_key;
        let process_ids: Vec<ProcessId> = self.process_spaces.keys().copied().collect();
        for pid in process_ids {
            if let Some(mut other_space) = other.process_spaces.remove(&pid) {
                let self_space = self.process_spaces.get_mut(&pid).expect("checked present above");
                merge_address_space(self_space, &mut other_space, in_a, cow_key, interner)?;
            }
        }
        let thread_keys: Vec<ThreadId> = self.thread_spaces.keys().copied().collect();
        for tid in thread_keys {
            if let Some(mut other_space) = other.thread_spaces.remove(&tid) {
                let self_space = self.thread_spaces.get_mut(&tid).expect("checked present above");
                merge_address_space(self_space, &mut other_space, in_a, cow_key, interner)?;
            }
        }
        let wg_keys: Vec<u32> = self.workgroup_spaces.keys().copied().collect();
        for wg in wg_keys {
            if let Some(mut other_space) = other.workgroup_spaces.remove(&wg) {
                let self_space = self.workgroup_spaces.get_mut(&wg).expect("checked present above");
                merge_address_space(self_space, &mut other_space, in_a, cow_key, interner)?;
            }
        }

        let common_len = self.constraints.constraints().len() - a_suffix.len();
        let disjunction = interner.create(Builder::Or(in_a, in_b))?;
        let mut rebuilt = ConstraintManager::new(self.constraints.solver().clone());
        let prefix: Vec<ExprRef> = self.constraints.constraints()[..common_len].to_vec();
        for c in prefix {
            rebuilt.add(interner, c)?;
        }
        rebuilt.add(interner, disjunction)?;
        self.constraints = rebuilt;
        self.weight += other.weight;
        self.diagnostics.extend(other.diagnostics);

        Ok(true)
    }

    fn mergeable(a: &Self, b: &Self) -> bool {
        if a.scheduled != b.scheduled {
            return false;
        }
        if let Some(tid) = a.scheduled {
            match (a.threads.get(&tid), b.threads.get(&tid)) {
                (Some(ta), Some(tb)) if ta.pc == tb.pc => {}
                _ => return false,
            }
        }
        for (tid, ta) in &a.threads {
            let Some(tb) = b.threads.get(tid) else { continue };
            if ta.stack.len() != tb.stack.len() {
                return false;
            }
            for (fa, fb) in ta.stack.iter().zip(tb.stack.iter()) {
                if fa.function != fb.function || fa.module != fb.module {
                    return false;
                }
            }
        }
        same_bindings(&a.process_spaces, &b.process_spaces)
            && same_bindings(&a.thread_spaces, &b.thread_spaces)
            && same_bindings(&a.workgroup_spaces, &b.workgroup_spaces)
    }
}

fn fork_space_map<K: core::hash::Hash + Eq + Copy>(map: &HashMap<K, AddressSpace>) -> HashMap<K, AddressSpace> {
    map.iter().map(|(k, v)| (*k, v.fork())).collect()
}

fn same_bindings<K: core::hash::Hash + Eq>(a: &HashMap<K, AddressSpace>, b: &HashMap<K, AddressSpace>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    for (key, space_a) in a {
        let Some(space_b) = b.get(key) else { return false };
        let addrs_a: HashSet<u64> = space_a.addresses().collect();
        let addrs_b: HashSet<u64> = space_b.addresses().collect();
        if addrs_a != addrs_b {
            return false;
        }
    }
    true
}

/// Constraints present in `longer` but not in `shorter`, in `longer`'s
/// order (the two constraint sets are append-only and diverge at a
/// shared prefix, so this recovers each path's post-branch suffix).
fn suffix(longer: &[ExprRef], shorter: &[ExprRef]) -> Vec<ExprRef> {
    let seen: HashSet<ExprRef> = shorter.iter().copied().collect();
    longer.iter().copied().filter(|e| !seen.contains(e)).collect()
}

fn conjunction(interner: &mut Interner, exprs: &[ExprRef]) -> CoreResult<ExprRef> {
    let mut acc = interner.const_bool(true);
    for &e in exprs {
        acc = interner.create(Builder::And(acc, e))?;
    }
    Ok(acc)
}

fn is_fp_comparison(interner: &Interner, e: ExprRef) -> bool {
    matches!(
        interner.get(e),
        Expr::FOeq(..)
            | Expr::FOlt(..)
            | Expr::FOle(..)
            | Expr::FOgt(..)
            | Expr::FOge(..)
            | Expr::FOne(..)
            | Expr::FOrd(..)
            | Expr::FUno(..)
            | Expr::FUeq(..)
            | Expr::FUlt(..)
            | Expr::FUle(..)
            | Expr::FUgt(..)
            | Expr::FUge(..)
            | Expr::FUne(..)
            | Expr::FOrd1(..)
    )
}

fn merge_address_space(
    a: &mut AddressSpace,
    b: &mut AddressSpace,
    in_a: ExprRef,
    cow_key: u64,
    interner: &mut Interner,
) -> CoreResult<()> {
    let setup = ThreadId::new(crate::consts::SETUP_THREAD_ID);
    let addresses: Vec<u64> = a.addresses().collect();
    for address in addresses {
        let size = a.writeable(address, cow_key)?.object().size;
        for offset in 0..size {
            let (val_a, _) = a.writeable(address, cow_key)?.read8(offset, setup, 0, interner)?;
            let (val_b, _) = b.writeable(address, cow_key)?.read8(offset, setup, 0, interner)?;
            if val_a != val_b {
                let merged = interner.create(Builder::Select(in_a, val_a, val_b))?;
                a.writeable(address, cow_key)?.write8(offset, merged, setup, 0, interner)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::{
        array::Array,
        error::SolverFailure,
        frontend::{
            FunctionId,
            ModuleId,
        },
        solver::{
            ArrayAssignment,
            Query,
            QueryResult,
            Validity,
        },
    };

    #[derive(Clone)]
    struct StubSolver;
    impl SolverBackend for StubSolver {
        fn compute_validity(&self, _query: Query<'_>) -> Result<Validity, SolverFailure> {
            Ok(Validity::Unknown)
        }
        fn compute_value(&self, query: Query<'_>) -> Result<ExprRef, SolverFailure> {
            Ok(query.expression)
        }
        fn compute_initial_values(&self, _query: Query<'_>, _arrays: &[&Array]) -> Result<QueryResult, SolverFailure> {
            Ok(QueryResult::Model(Vec::<ArrayAssignment>::new()))
        }
    }

    fn entry_frame(interner: &mut Interner, registers: usize) -> StackFrame {
        let undef = interner.const_u128(0, 32);
        StackFrame::new(None, FunctionId::new(0), ModuleId::new(0), registers, undef)
    }

    fn fresh_state() -> (ExecutionState<StubSolver>, Interner) {
        let mut interner = Interner::new();
        let options = CoreOptions::default();
        let frame = entry_frame(&mut interner, 0);
        let state = ExecutionState::new(&options, StubSolver, frame, InstructionId::new(0)).unwrap();
        (state, interner)
    }

    #[test]
    fn new_state_has_one_scheduled_thread() {
        let (state, _) = fresh_state();
        assert_eq!(state.scheduled_thread(), Some(ThreadId::new(1)));
        assert!(state.process(ProcessId::INIT).is_some());
    }

    #[test]
    fn sleep_then_notify_reschedules() {
        let (mut state, _) = fresh_state();
        let tid = state.scheduled_thread().unwrap();
        let wlist = state.new_wait_list();
        state.sleep(tid, wlist).unwrap();
        assert_eq!(state.scheduled_thread(), None);
        state.notify_one(wlist, tid).unwrap();
        assert!(state.thread(tid).unwrap().enabled);
        state.schedule(tid).unwrap();
        assert_eq!(state.scheduled_thread(), Some(tid));
    }

    #[test]
    fn barrier_releases_on_nth_arrival() {
        let (mut state, mut interner) = fresh_state();
        let t1 = state.scheduled_thread().unwrap();
        let frame = entry_frame(&mut interner, 0);
        let t2 = state.spawn_thread(ProcessId::INIT, 0, frame, InstructionId::new(0)).unwrap();
        let wlist = state.new_wait_list();
        let released = state.barrier(wlist, 2, t1, AddressSpaceKind::Process(ProcessId::INIT), false).unwrap();
        assert!(!released);
        let released = state.barrier(wlist, 2, t2, AddressSpaceKind::Process(ProcessId::INIT), false).unwrap();
        assert!(released);
    }

    #[test]
    fn branch_duplicates_process_image_without_sharing_writes() {
        let (mut state, mut interner) = fresh_state();
        let obj = Arc::new(MemoryObject::new(0x1000, 4, true, false, false));
        let array = Arc::new(Array::symbolic("backing", 4));
        state.bind_object(AddressSpaceKind::Process(ProcessId::INIT), obj.clone(), ObjectState::new_concrete(obj, array, 0));

        let mut child = state.branch();
        assert_eq!(child.depth(), 1);
        assert!((state.weight() - 0.5).abs() < 1e-9);
        assert!((child.weight() - 0.5).abs() < 1e-9);

        let byte = interner.const_u128(0x42, 8);
        child
            .write(AddressSpaceKind::Process(ProcessId::INIT), 0x1000, byte, 8, ThreadId::new(1), 0, &mut interner)
            .unwrap();
        let parent_value =
            state.read(AddressSpaceKind::Process(ProcessId::INIT), 0x1000, 8, ThreadId::new(1), 0, &mut interner).unwrap();
        assert_eq!(interner.int_constant(parent_value).unwrap().to_u128(), 0);
    }

    #[test]
    fn fork_process_duplicates_threads_under_fresh_ids() {
        let (mut state, _) = fresh_state();
        let (parent, child) = state.fork_process(ProcessId::INIT).unwrap();
        assert_ne!(parent, child);
        let parent_proc = state.process(parent).unwrap();
        let child_proc = state.process(child).unwrap();
        assert_eq!(parent_proc.threads.len(), child_proc.threads.len());
        assert!(parent_proc.threads.iter().all(|t| !child_proc.threads.contains(t)));
    }

    // §8 scenario 5, literally: "state s0 with one process containing one
    // thread calls forkProcess(pid=3). s0 now has two processes with
    // identical address-space contents but cowKey bumped; after a write in
    // the child, only the child's copy changes." Parameterised with
    // `test-case` over which side writes, to also cover the symmetric
    // "write in parent doesn't leak to child" direction.
    #[test_case::test_case(true; "write_in_child_is_isolated_from_parent")]
    #[test_case::test_case(false; "write_in_parent_is_isolated_from_child")]
    fn fork_process_scenario_isolates_writes(write_in_child: bool) {
        let (mut state, mut interner) = fresh_state();
        let obj = Arc::new(MemoryObject::new(0x1000, 4, true, false, false));
        let array = Arc::new(Array::constant("scenario", alloc::vec![0x11, 0x22, 0x33, 0x44]));
        state.bind_object(
            AddressSpaceKind::Process(ProcessId::INIT),
            obj.clone(),
            ObjectState::new_concrete(obj, array, 0),
        );

        let (parent, child) = state.fork_process(ProcessId::INIT).unwrap();
        assert_eq!(parent, ProcessId::INIT);
        assert_ne!(parent, child);

        let (writer, reader) = if write_in_child { (child, parent) } else { (parent, child) };
        let new_byte = interner.const_u128(0xFF, 8);
        state.write(AddressSpaceKind::Process(writer), 0x1000, new_byte, 8, ThreadId::new(1), 0, &mut interner).unwrap();

        let written = state.read(AddressSpaceKind::Process(writer), 0x1000, 8, ThreadId::new(1), 0, &mut interner).unwrap();
        assert_eq!(interner.int_constant(written).unwrap().to_u128(), 0xFF);

        let untouched = state.read(AddressSpaceKind::Process(reader), 0x1000, 8, ThreadId::new(1), 0, &mut interner).unwrap();
        assert_eq!(interner.int_constant(untouched).unwrap().to_u128(), 0x11);
    }

    #[test]
    fn terminate_process_reparents_children_to_root() {
        let (mut state, _) = fresh_state();
        let (_, child) = state.fork_process(ProcessId::INIT).unwrap();
        let (_, grandchild) = state.fork_process(child).unwrap();
        state.terminate_process(child, None).unwrap();
        assert_eq!(state.process(grandchild).unwrap().parent, Some(ProcessId::INIT));
        assert!(state.process(ProcessId::INIT).unwrap().children.contains(&grandchild));
    }
}
