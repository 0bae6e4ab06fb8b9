//! Access traces.
//!
//! A trace is the JSON description of a workload. It carries:
//! 1. **Preload:** words placed in main memory before the first tick.
//! 2. **Operations:** front-end reads and writes plus control actions, replayed in order.
//!
//! ```json
//! {
//!   "preload": [{ "addr": 256, "data": 7 }],
//!   "ops": [
//!     { "op": "read", "addr": 256 },
//!     { "op": "write", "addr": 260, "data": 9 },
//!     { "op": "drain" },
//!     { "op": "invalidate" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::data::Request;
use crate::common::error::CacheError;

/// A word placed in memory before the trace runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryWord {
    /// Byte address.
    pub addr: u64,
    /// Word value.
    pub data: u64,
}

/// One trace step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceOp {
    /// Front-end read.
    Read {
        /// Byte address.
        addr: u64,
    },
    /// Front-end write.
    Write {
        /// Byte address.
        addr: u64,
        /// Write data.
        data: u64,
        /// Byte strobe; every lane when omitted.
        #[serde(default = "TraceOp::default_wstrb")]
        wstrb: u8,
    },
    /// Global invalidate through the control interface.
    Invalidate,
    /// Hit/miss counter reset through the control interface.
    ResetCounters,
    /// Tick until every write-through write in the stack has reached memory.
    Drain,
    /// Tick with no front-end request.
    Idle {
        /// Ticks to wait.
        ticks: u64,
    },
}

impl TraceOp {
    const fn default_wstrb() -> u8 {
        u8::MAX
    }

    /// The front-end request of a read or write step.
    pub const fn request(&self) -> Option<Request> {
        match *self {
            Self::Read { addr } => Some(Request::read(addr)),
            Self::Write { addr, data, wstrb } => Some(Request::write(addr, data, wstrb)),
            Self::Invalidate | Self::ResetCounters | Self::Drain | Self::Idle { .. } => None,
        }
    }
}

/// A workload: memory image plus steps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Words written to memory before the first tick.
    #[serde(default)]
    pub preload: Vec<MemoryWord>,
    /// Steps, in order.
    pub ops: Vec<TraceOp>,
}

impl Trace {
    /// Parses a trace from JSON. A bare array is accepted as a trace with no preload.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Json` for malformed input.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        if json.trim_start().starts_with('[') {
            let ops: Vec<TraceOp> = serde_json::from_str(json)?;
            return Ok(Self {
                preload: Vec::new(),
                ops,
            });
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a trace from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the trace file.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
