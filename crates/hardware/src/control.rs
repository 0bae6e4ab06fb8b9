//! Control interface.
//!
//! [`CacheController`] decorates a [`CacheEngine`] with the software-visible
//! control block of the cache:
//! 1. **Counters:** read/write hit/miss counts, incremented once per request on
//!    the tick its outcome is decided and reset together. Optional
//!    (`CacheConfig::use_ctrl_cnt`); without them the counter registers read 0.
//! 2. **Status:** write-through buffer empty/full and the IP version.
//! 3. **Commands:** global invalidate and counter reset.
//!
//! The engine itself carries no control state; a cache built without the control
//! interface is just a bare engine.
//!
//! Registers are reached through [`CtrlRegister`] rather than addresses. How a system
//! maps them into its address space is left to the system.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::BackEnd;
use crate::cache::CacheEngine;
use crate::common::data::{AccessKind, AccessOutcome, Request, Response};
use crate::common::error::ConfigError;
use crate::config::CacheConfig;

/// IP version reported by the version register (0.71).
pub const VERSION: u32 = 0x0071;

/// The four hit/miss counters. 32-bit, wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitMissCounters {
    /// Read hits.
    pub read_hit: u32,
    /// Read misses.
    pub read_miss: u32,
    /// Write hits.
    pub write_hit: u32,
    /// Write misses.
    pub write_miss: u32,
}

impl HitMissCounters {
    /// Counts one hit/miss decision.
    pub const fn count(&mut self, kind: AccessKind, outcome: AccessOutcome) {
        let slot = match (kind, outcome) {
            (AccessKind::Read, AccessOutcome::Hit) => &mut self.read_hit,
            (AccessKind::Read, AccessOutcome::Miss) => &mut self.read_miss,
            (AccessKind::Write, AccessOutcome::Hit) => &mut self.write_hit,
            (AccessKind::Write, AccessOutcome::Miss) => &mut self.write_miss,
        };
        *slot = slot.wrapping_add(1);
    }

    /// Read plus write hits.
    pub const fn rw_hit(&self) -> u32 {
        self.read_hit.wrapping_add(self.write_hit)
    }

    /// Read plus write misses.
    pub const fn rw_miss(&self) -> u32 {
        self.read_miss.wrapping_add(self.write_miss)
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Logical control registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtrlRegister {
    /// 1 when every write-through write has reached the back end.
    WtbEmpty,
    /// 1 when the write-through buffer is full.
    WtbFull,
    /// Read + write hits.
    RwHit,
    /// Read + write misses.
    RwMiss,
    /// Read hits.
    ReadHit,
    /// Read misses.
    ReadMiss,
    /// Write hits.
    WriteHit,
    /// Write misses.
    WriteMiss,
    /// Write 1 to zero the counters.
    ResetCounters,
    /// Write 1 to invalidate the whole cache.
    Invalidate,
    /// IP version.
    Version,
}

impl CtrlRegister {
    /// Every register, in block order.
    pub const ALL: [Self; 11] = [
        Self::WtbEmpty,
        Self::WtbFull,
        Self::RwHit,
        Self::RwMiss,
        Self::ReadHit,
        Self::ReadMiss,
        Self::WriteHit,
        Self::WriteMiss,
        Self::ResetCounters,
        Self::Invalidate,
        Self::Version,
    ];

    /// Returns true for registers that accept writes.
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ResetCounters | Self::Invalidate)
    }
}

/// Cache engine with the control interface attached.
#[derive(Debug)]
pub struct CacheController<B: BackEnd> {
    engine: CacheEngine<B>,
    counters: HitMissCounters,
    counting: bool,
}

impl<B: BackEnd> CacheController<B> {
    /// Builds an engine and wraps it.
    ///
    /// # Errors
    ///
    /// Returns the first constraint the configuration violates.
    pub fn new(config: &CacheConfig, back_end: B) -> Result<Self, ConfigError> {
        CacheEngine::new(config, back_end).map(Self::wrap)
    }

    /// Wraps an existing engine with zeroed counters, present if the engine's
    /// configuration asks for them.
    pub fn wrap(engine: CacheEngine<B>) -> Self {
        Self {
            counting: engine.config().use_ctrl_cnt,
            engine,
            counters: HitMissCounters::default(),
        }
    }

    /// Advances the engine one clock and counts the hit/miss decided on it, if any.
    pub fn tick(&mut self, req: Option<&Request>) -> Option<Response> {
        let resp = self.engine.tick(req);
        if let Some((kind, outcome)) = self.engine.take_outcome() {
            if self.counting {
                self.counters.count(kind, outcome);
            }
        }
        resp
    }

    /// True if the control block was built with hit/miss counters.
    pub const fn has_counters(&self) -> bool {
        self.counting
    }

    /// Current counter values.
    pub const fn counters(&self) -> &HitMissCounters {
        &self.counters
    }

    /// Zeroes all four counters at once.
    pub fn reset_counters(&mut self) {
        self.counters.reset();
        info!(cycle = self.engine.stats().cycles, "hit/miss counters reset");
    }

    /// Requests a global invalidate; see [`CacheEngine::invalidate`].
    pub fn invalidate(&mut self, invalidate_i: bool) -> bool {
        self.engine.invalidate(invalidate_i)
    }

    /// Returns and clears the invalidate-done pulse.
    pub fn take_invalidate_out(&mut self) -> bool {
        self.engine.take_invalidate_out()
    }

    /// True once every write-through write has been acknowledged by the back end.
    pub fn write_buffer_empty(&self) -> bool {
        self.engine.write_buffer_empty()
    }

    /// True while the write-through buffer is full.
    pub fn write_buffer_full(&self) -> bool {
        self.engine.write_buffer_full()
    }

    /// Reads a control register.
    ///
    /// Write-only registers read as 0.
    pub fn read_register(&self, reg: CtrlRegister) -> u32 {
        match reg {
            CtrlRegister::WtbEmpty => u32::from(self.write_buffer_empty()),
            CtrlRegister::WtbFull => u32::from(self.write_buffer_full()),
            CtrlRegister::RwHit => self.counters.rw_hit(),
            CtrlRegister::RwMiss => self.counters.rw_miss(),
            CtrlRegister::ReadHit => self.counters.read_hit,
            CtrlRegister::ReadMiss => self.counters.read_miss,
            CtrlRegister::WriteHit => self.counters.write_hit,
            CtrlRegister::WriteMiss => self.counters.write_miss,
            CtrlRegister::ResetCounters | CtrlRegister::Invalidate => 0,
            CtrlRegister::Version => VERSION,
        }
    }

    /// Writes a control register. Bit 0 triggers the command registers; writes
    /// to read-only registers are ignored.
    pub fn write_register(&mut self, reg: CtrlRegister, value: u32) {
        let strobe = value & 1 != 0;
        match reg {
            CtrlRegister::ResetCounters if strobe => self.reset_counters(),
            CtrlRegister::Invalidate if strobe => {
                let _ = self.invalidate(true);
            }
            CtrlRegister::ResetCounters | CtrlRegister::Invalidate => {}
            _ => debug!(?reg, value, "write to read-only control register ignored"),
        }
    }

    /// The wrapped engine.
    pub const fn engine(&self) -> &CacheEngine<B> {
        &self.engine
    }

    /// The wrapped engine, mutably.
    pub const fn engine_mut(&mut self) -> &mut CacheEngine<B> {
        &mut self.engine
    }
}
