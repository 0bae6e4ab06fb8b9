//! Cache building blocks and the engine that drives them.
//!
//! This module contains:
//! 1. **Stores:** Tag/valid/dirty metadata and line data, one entry per (set, way).
//! 2. **Policies:** LRU, PLRU-MRU and PLRU-Tree victim selection.
//! 3. **Write-through buffer:** FIFO of writes waiting for the back end.
//! 4. **Engine:** The IDLE / LOOKUP / FILL_WAIT / WRITEBACK_WAIT state machine.

/// Line storage.
pub mod data_store;

/// Cache controller state machine.
pub mod engine;

/// Replacement policies.
pub mod policies;

/// Tag, valid and dirty metadata.
pub mod tag_store;

/// Write-through buffer.
pub mod write_buffer;

pub use data_store::DataStore;
pub use engine::{CacheEngine, EngineState};
pub use policies::ReplacementPolicy;
pub use tag_store::{TagEntry, TagStore};
pub use write_buffer::{WriteBufferEntry, WriteThroughBuffer};
