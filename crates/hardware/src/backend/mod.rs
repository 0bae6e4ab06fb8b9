//! Back-end (memory-side) port.
//!
//! The back end is memory or a next-level cache. It is modeled as an external
//! responder with a simple request/acknowledge contract:
//! 1. **Request:** the engine presents one transaction with [`BackEnd::request`].
//! 2. **Poll:** every tick the engine calls [`BackEnd::poll`]; the responder returns
//!    the acknowledgement, carrying read data for reads, on the tick it completes.
//!    A responder with nothing outstanding returns `None`.
//!
//! At most one transaction is outstanding at a time. Latency is unbounded but finite;
//! a responder that never acknowledges deadlocks the engine, which the simulation
//! driver reports as a timeout.

/// Memory controller latency models.
pub mod controller;

/// Reference main-memory responder.
pub mod memory;

pub use controller::{DramController, MemoryController, SimpleController};
pub use memory::MainMemory;

use crate::hierarchy::HierarchyLevel;

/// A back-end transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackEndRequest {
    /// Read a whole line for a refill.
    ReadLine {
        /// Byte address of the first byte of the line.
        addr: u64,
        /// Front-end words in the line.
        words: usize,
    },
    /// Write one byte-strobed word drained from the write-through buffer.
    WriteWord {
        /// Word-aligned byte address.
        addr: u64,
        /// Write data.
        data: u64,
        /// Byte strobe.
        wstrb: u8,
    },
    /// Write back a whole dirty line.
    WriteLine {
        /// Byte address of the first byte of the line.
        addr: u64,
        /// Line contents, one front-end word per element.
        data: Vec<u64>,
    },
}

impl BackEndRequest {
    /// Returns true for write transactions.
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::ReadLine { .. })
    }

    /// Byte address of the transaction.
    pub const fn addr(&self) -> u64 {
        match self {
            Self::ReadLine { addr, .. } | Self::WriteWord { addr, .. } | Self::WriteLine { addr, .. } => {
                *addr
            }
        }
    }
}

/// Acknowledgement of a back-end transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackEndResponse {
    /// Read completed; one front-end word per element.
    ReadAck(Vec<u64>),
    /// Write completed.
    WriteAck,
}

/// A memory-side responder.
pub trait BackEnd {
    /// Presents a transaction. The caller never has more than one outstanding.
    fn request(&mut self, req: BackEndRequest);

    /// Advances the responder by one tick and returns the acknowledgement of the
    /// outstanding transaction if it completes on this tick.
    ///
    /// Called on every engine tick, including ticks with nothing outstanding.
    fn poll(&mut self) -> Option<BackEndResponse>;

    /// The cache level behind this port, if the back end is itself a cache.
    fn next_level(&mut self) -> Option<&mut dyn HierarchyLevel> {
        None
    }

    /// Shared view of [`next_level`](Self::next_level).
    fn next_level_ref(&self) -> Option<&dyn HierarchyLevel> {
        None
    }
}

impl<T: BackEnd + ?Sized> BackEnd for Box<T> {
    fn request(&mut self, req: BackEndRequest) {
        (**self).request(req);
    }

    fn poll(&mut self) -> Option<BackEndResponse> {
        (**self).poll()
    }

    fn next_level(&mut self) -> Option<&mut dyn HierarchyLevel> {
        (**self).next_level()
    }

    fn next_level_ref(&self) -> Option<&dyn HierarchyLevel> {
        (**self).next_level_ref()
    }
}
