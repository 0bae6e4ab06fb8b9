//! Memory-side cache simulator library.
//!
//! This crate implements a cycle-level model of a configurable cache controller with the following:
//! 1. **Cache:** Tag and data stores, LRU / PLRU-MRU / PLRU-Tree replacement, a
//!    write-through buffer, and the IDLE / LOOKUP / FILL_WAIT / WRITEBACK_WAIT engine.
//! 2. **Back end:** The memory-side port contract and a reference main memory with
//!    fixed or DRAM-style latency.
//! 3. **Control:** Hit/miss counters, invalidate and buffer status, and chaining of
//!    several cache levels.
//! 4. **Simulation:** Configuration, trace replay and statistics reporting.

/// Memory-side port and reference main memory.
pub mod backend;
/// Stores, replacement policies, write-through buffer and the engine.
pub mod cache;
/// Common types (addresses, front-end transactions, errors).
pub mod common;
/// Cache configuration (defaults, enums, validation).
pub mod config;
/// Control interface (counters, invalidate, status registers).
pub mod control;
/// Multi-level chaining of invalidate and buffer status.
pub mod hierarchy;
/// Simulation driver and traces.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Cache configuration; use `CacheConfig::default()` or deserialize from JSON.
pub use crate::config::CacheConfig;
/// The cache engine; generic over its back end.
pub use crate::cache::CacheEngine;
/// Engine with the control interface attached.
pub use crate::control::CacheController;
/// Front-end request and acknowledgement.
pub use crate::common::{Request, Response};
/// Trace-driven simulator.
pub use crate::sim::Simulator;
