//! POSIX-model boundary primitives (spec §6).
//!
//! The POSIX layer itself (processes, file descriptors, sockets) is an
//! out-of-scope external collaborator built *on top of* the core. What the
//! core exports is the minimum the collaborator needs to park blocked
//! readers/writers on the core's own scheduling primitives (§4.5) instead
//! of inventing its own: a byte ring with `read`/`write`/`close` semantics,
//! and an endpoint table for connection-oriented constructs (pipes,
//! sockets) keyed by an opaque handle.

use alloc::collections::VecDeque;

use hashbrown::HashMap;

use crate::thread::WaitListId;

/// A producer/consumer byte ring shared across processes. Readers block on
/// `readers_wait_list` when empty-and-open; writers block on
/// `writers_wait_list` when full; both are plain [`WaitListId`]s the
/// (external) scheduler manages through §4.5's `sleep`/`notifyAll`.
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    data: VecDeque<u8>,
    capacity: usize,
    closed: bool,
    /// Waiting list blocked readers park on when the buffer is empty.
    pub readers_wait_list: WaitListId,
    /// Waiting list blocked writers park on when the buffer is full.
    pub writers_wait_list: WaitListId,
}

/// Outcome of a [`StreamBuffer`] operation that could not proceed
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamBlocked {
    /// No data available and the buffer is still open; the caller should
    /// `sleep` on `readers_wait_list`.
    Empty,
    /// The buffer is at capacity; the caller should `sleep` on
    /// `writers_wait_list`.
    Full,
}

impl StreamBuffer {
    /// A fresh, empty buffer of `capacity` bytes, parked on the two
    /// waiting lists the caller allocated for it.
    pub fn new(capacity: usize, readers_wait_list: WaitListId, writers_wait_list: WaitListId) -> Self {
        Self { data: VecDeque::with_capacity(capacity), capacity, closed: false, readers_wait_list, writers_wait_list }
    }

    /// Pull up to `max_len` bytes. Returns `Ok(bytes)` (possibly fewer than
    /// requested, possibly empty only if closed) or `Err(Empty)` if the
    /// caller should block.
    pub fn read(&mut self, max_len: usize) -> Result<alloc::vec::Vec<u8>, StreamBlocked> {
        if self.data.is_empty() {
            if self.closed {
                return Ok(alloc::vec::Vec::new());
            }
            return Err(StreamBlocked::Empty);
        }
        let n = max_len.min(self.data.len());
        Ok(self.data.drain(..n).collect())
    }

    /// Push `bytes`, as many as fit without exceeding capacity. Returns the
    /// number of bytes actually written; `Err(Full)` only when zero bytes
    /// could be written and the caller should block.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, StreamBlocked> {
        if self.closed {
            return Ok(0);
        }
        let room = self.capacity.saturating_sub(self.data.len());
        if room == 0 {
            return Err(StreamBlocked::Full);
        }
        let n = room.min(bytes.len());
        self.data.extend(&bytes[..n]);
        Ok(n)
    }

    /// Mark the buffer closed: further writes are dropped and reads past
    /// the last buffered byte return empty immediately rather than
    /// blocking.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Opaque handle into an [`EndpointTable`], analogous to a file descriptor
/// or socket handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointHandle(u32);

impl EndpointHandle {
    /// Construct from a raw id assigned by [`EndpointTable::allocate`].
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw numeric id.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A table of connection-oriented endpoints (pipes, sockets), each a
/// [`StreamBuffer`] reached by an [`EndpointHandle`]. The POSIX layer owns
/// the mapping from its own fd numbers to these handles; the core only
/// needs to hand out fresh handles and look up the buffer behind one.
#[derive(Debug, Clone, Default)]
pub struct EndpointTable {
    next: u32,
    endpoints: HashMap<EndpointHandle, StreamBuffer>,
}

impl EndpointTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `buffer` under a freshly allocated handle.
    pub fn allocate(&mut self, buffer: StreamBuffer) -> EndpointHandle {
        let handle = EndpointHandle::new(self.next);
        self.next += 1;
        self.endpoints.insert(handle, buffer);
        handle
    }

    /// Look up the buffer behind `handle`.
    pub fn get(&self, handle: EndpointHandle) -> Option<&StreamBuffer> {
        self.endpoints.get(&handle)
    }

    /// Look up the buffer behind `handle`, mutably.
    pub fn get_mut(&mut self, handle: EndpointHandle) -> Option<&mut StreamBuffer> {
        self.endpoints.get_mut(&handle)
    }

    /// Remove and return the buffer behind `handle`, e.g. on the last
    /// `close`/`free` of a descriptor.
    pub fn remove(&mut self, handle: EndpointHandle) -> Option<StreamBuffer> {
        self.endpoints.remove(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = StreamBuffer::new(4, WaitListId::new(0), WaitListId::new(1));
        assert_eq!(buf.write(b"hi").unwrap(), 2);
        assert_eq!(buf.read(10).unwrap(), b"hi".to_vec());
    }

    #[test]
    fn full_buffer_blocks_writer() {
        let mut buf = StreamBuffer::new(2, WaitListId::new(0), WaitListId::new(1));
        assert_eq!(buf.write(b"ab").unwrap(), 2);
        assert_eq!(buf.write(b"c"), Err(StreamBlocked::Full));
    }

    #[test]
    fn empty_open_buffer_blocks_reader_but_closed_returns_empty() {
        let mut buf = StreamBuffer::new(2, WaitListId::new(0), WaitListId::new(1));
        assert_eq!(buf.read(1), Err(StreamBlocked::Empty));
        buf.close();
        assert_eq!(buf.read(1).unwrap(), alloc::vec::Vec::<u8>::new());
    }

    #[test]
    fn endpoint_table_hands_out_distinct_handles() {
        let mut table = EndpointTable::new();
        let a = table.allocate(StreamBuffer::new(1, WaitListId::new(0), WaitListId::new(1)));
        let b = table.allocate(StreamBuffer::new(1, WaitListId::new(2), WaitListId::new(3)));
        assert_ne!(a, b);
        assert!(table.get(a).is_some());
        assert!(table.remove(a).is_some());
        assert!(table.get(a).is_none());
    }
}
