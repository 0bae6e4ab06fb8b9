//! Simulation driver and workload traces.
//!
//! Provides the front-end driver that replays requests against a cache and the
//! JSON trace format it reads.

/// Front-end driver and hierarchy coordinator.
pub mod simulator;

/// Trace format and loading.
pub mod trace;

pub use simulator::{Simulator, TraceReport};
pub use trace::{MemoryWord, Trace, TraceOp};
