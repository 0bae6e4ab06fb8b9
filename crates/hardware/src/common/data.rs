//! Front-end transaction types.
//!
//! This module defines what travels over the CPU-facing port:
//! 1. **Requests:** a read or a byte-strobed write to one front-end word.
//! 2. **Responses:** the acknowledgement, carrying read data and whether the
//!    access hit or missed.
//! 3. **Strobe merging:** byte-lane selection shared by the data store, the
//!    write-through buffer and the back-end model.

use serde::{Deserialize, Serialize};

/// Direction of a front-end access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// Data read.
    Read,
    /// Data write (byte-strobed).
    Write,
}

/// Whether the access found its line in the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessOutcome {
    /// The line was present and valid.
    Hit,
    /// The line was absent.
    Miss,
}

/// A front-end request.
///
/// The front end holds a request until it is acknowledged; the engine latches it
/// when it leaves IDLE and works on that copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Read or write.
    pub kind: AccessKind,
    /// Byte address.
    pub addr: u64,
    /// Write data (ignored for reads).
    pub wdata: u64,
    /// Byte strobe, one bit per byte lane (ignored for reads).
    pub wstrb: u8,
}

impl Request {
    /// Creates a read request.
    pub const fn read(addr: u64) -> Self {
        Self {
            kind: AccessKind::Read,
            addr,
            wdata: 0,
            wstrb: 0,
        }
    }

    /// Creates a byte-strobed write request.
    pub const fn write(addr: u64, wdata: u64, wstrb: u8) -> Self {
        Self {
            kind: AccessKind::Write,
            addr,
            wdata,
            wstrb,
        }
    }

    /// Creates a write request that writes every byte lane.
    pub const fn write_word(addr: u64, wdata: u64) -> Self {
        Self::write(addr, wdata, u8::MAX)
    }

    /// Returns true for writes.
    #[inline]
    pub const fn is_write(&self) -> bool {
        matches!(self.kind, AccessKind::Write)
    }
}

/// Acknowledgement of a front-end request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Kind of the acknowledged request.
    pub kind: AccessKind,
    /// Address of the acknowledged request.
    pub addr: u64,
    /// Read data; zero for writes.
    pub rdata: u64,
    /// Hit or miss, decided when the request left LOOKUP.
    pub outcome: AccessOutcome,
}

impl Response {
    /// Returns true if the access hit.
    #[inline]
    pub const fn is_hit(&self) -> bool {
        matches!(self.outcome, AccessOutcome::Hit)
    }
}

/// Expands a byte strobe into a bit mask over a 64-bit word.
#[inline]
pub const fn strobe_mask(wstrb: u8) -> u64 {
    let mut mask = 0u64;
    let mut lane = 0;
    while lane < 8 {
        if wstrb & (1 << lane) != 0 {
            mask |= 0xFF << (lane * 8);
        }
        lane += 1;
    }
    mask
}

/// Replaces the byte lanes of `old` selected by `wstrb` with those of `new`.
#[inline]
pub const fn merge_strobe(old: u64, new: u64, wstrb: u8) -> u64 {
    let mask = strobe_mask(wstrb);
    (old & !mask) | (new & mask)
}
