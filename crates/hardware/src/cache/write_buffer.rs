//! Write-Through Buffer for deferred back-end writes.
//!
//! In write-through mode every front-end write is queued here and acknowledged
//! immediately; the buffer drains to the back end one entry at a time, independently
//! of front-end request processing. It provides:
//! 1. **Enqueue:** Append a write; refused when full so the engine stalls the write.
//! 2. **Drain:** The oldest entry is offered to the back end and removed once acknowledged.
//! 3. **Hazard detection:** Reports undrained writes to an address so reads can stall
//!    until the back end has observed them.
//!
//! The buffer is a fixed ring with a single writer (the engine) and a single reader
//! (the drain), so entries leave in exactly the order they entered.

use serde::{Deserialize, Serialize};

/// A single queued write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBufferEntry {
    /// Word-aligned byte address.
    pub addr: u64,
    /// Write data.
    pub data: u64,
    /// Byte strobe.
    pub wstrb: u8,
}

/// Write-through buffer: bounded FIFO of pending writes.
#[derive(Clone, Debug)]
pub struct WriteThroughBuffer {
    entries: Vec<WriteBufferEntry>,
    /// Index of the oldest entry.
    head: usize,
    /// Index where the next entry will be stored.
    tail: usize,
    /// Number of valid entries.
    count: usize,
}

impl WriteThroughBuffer {
    /// Creates a new buffer with the given capacity (a power of two).
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two(), "buffer depth must be 2^n");
        Self {
            entries: vec![WriteBufferEntry::default(); capacity],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Returns the capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of queued entries.
    #[inline]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the buffer is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if the buffer is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    #[inline]
    fn wrap(&self, idx: usize) -> usize {
        idx & (self.entries.len() - 1)
    }

    /// Appends a write. Returns false, leaving the buffer untouched, if it is full.
    pub fn enqueue(&mut self, entry: WriteBufferEntry) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries[self.tail] = entry;
        self.tail = self.wrap(self.tail + 1);
        self.count += 1;
        true
    }

    /// Removes and returns the oldest entry, or `None` if the buffer is empty.
    pub fn dequeue(&mut self) -> Option<WriteBufferEntry> {
        if self.count == 0 {
            return None;
        }
        let entry = self.entries[self.head];
        self.head = self.wrap(self.head + 1);
        self.count -= 1;
        Some(entry)
    }

    /// Returns the oldest entry without removing it.
    pub fn front(&self) -> Option<&WriteBufferEntry> {
        (self.count > 0).then(|| &self.entries[self.head])
    }

    /// Iterates the queued entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &WriteBufferEntry> + '_ {
        (0..self.count).map(move |i| &self.entries[self.wrap(self.head + i)])
    }

    /// Returns true if an undrained entry targets the word at `addr`.
    ///
    /// `addr` must be word-aligned the same way entries are.
    pub fn peek_for_hazard(&self, addr: u64) -> bool {
        self.iter().any(|e| e.addr == addr)
    }

    /// Returns true if any undrained entry satisfies `pred`.
    ///
    /// Used for line-granular checks before a refill.
    pub fn any_pending(&self, pred: impl Fn(&WriteBufferEntry) -> bool) -> bool {
        self.iter().any(pred)
    }
}
