//! Simulator: drives a controller-wrapped cache from a request stream.
//!
//! The simulator plays the front end and the hierarchy coordinator. It presents
//! one request at a time and holds it until acknowledged, and after every tick it
//! pushes latched invalidates down the stack. A request that is not acknowledged
//! within the tick budget is reported as [`CacheError::Timeout`].

use serde::Serialize;
use tracing::{debug, info};

use super::trace::{Trace, TraceOp};
use crate::backend::{BackEnd, MainMemory};
use crate::common::data::{Request, Response};
use crate::common::error::CacheError;
use crate::config::CacheConfig;
use crate::control::{CacheController, HitMissCounters};
use crate::hierarchy;
use crate::stats::CacheStats;

/// Default per-request tick budget.
pub const DEFAULT_TIMEOUT: u64 = 100_000;

/// Result of replaying a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraceReport {
    /// One acknowledgement per read or write step, in order.
    pub responses: Vec<Response>,
    /// Counter values after the last step.
    pub counters: HitMissCounters,
    /// Engine activity after the last step.
    pub stats: CacheStats,
}

impl TraceReport {
    /// Prints the statistics report to stdout.
    pub fn print(&self) {
        self.stats.print(&self.counters);
    }
}

/// Top-level simulator: a cache with its control interface.
#[derive(Debug)]
pub struct Simulator<B: BackEnd> {
    cache: CacheController<B>,
    timeout: u64,
    invalidate_done: bool,
}

impl Simulator<MainMemory> {
    /// Builds a cache over the reference main memory.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the configuration is rejected.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let cache = CacheController::new(config, MainMemory::new(config))?;
        Ok(Self::new(cache))
    }

    /// Writes a word straight into main memory.
    pub fn preload(&mut self, addr: u64, data: u64) {
        self.cache
            .engine_mut()
            .back_end_mut()
            .write_word(addr, data);
    }

    /// Reads a word straight from main memory.
    pub fn memory_word(&self, addr: u64) -> u64 {
        self.cache.engine().back_end().read_word(addr)
    }
}

impl<B: BackEnd> Simulator<B> {
    /// Wraps an existing controller.
    pub const fn new(cache: CacheController<B>) -> Self {
        Self {
            cache,
            timeout: DEFAULT_TIMEOUT,
            invalidate_done: false,
        }
    }

    /// Sets the per-request tick budget.
    #[must_use]
    pub const fn with_timeout(mut self, ticks: u64) -> Self {
        self.timeout = ticks;
        self
    }

    /// Advances the cache one clock and moves deferred invalidates down the stack.
    pub fn tick(&mut self, req: Option<&Request>) -> Option<Response> {
        let resp = self.cache.tick(req);
        self.invalidate_done |= hierarchy::propagate_invalidate(&mut self.cache, false);
        resp
    }

    /// Presents `req` until it is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Timeout` if no acknowledgement arrives within the budget.
    pub fn run_request(&mut self, req: &Request) -> Result<Response, CacheError> {
        for _ in 0..self.timeout {
            if let Some(resp) = self.tick(Some(req)) {
                return Ok(resp);
            }
        }
        Err(CacheError::Timeout {
            ticks: self.timeout,
        })
    }

    /// Ticks until every write-through write in the stack has reached memory.
    ///
    /// # Returns
    ///
    /// The number of ticks taken.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Timeout` if the buffers do not drain within the budget.
    pub fn drain(&mut self) -> Result<u64, CacheError> {
        let mut ticks = 0;
        while !hierarchy::write_buffer_empty(&self.cache) {
            if ticks == self.timeout {
                return Err(CacheError::Timeout { ticks });
            }
            let _ = self.tick(None);
            ticks += 1;
        }
        debug!(ticks, "write buffers drained");
        Ok(ticks)
    }

    /// Invalidates every level and waits until the bottom level has applied it.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Timeout` if the stack does not finish within the budget.
    pub fn invalidate(&mut self) -> Result<(), CacheError> {
        self.invalidate_done = hierarchy::propagate_invalidate(&mut self.cache, true);
        let mut ticks = 0;
        while !self.invalidate_done {
            if ticks == self.timeout {
                return Err(CacheError::Timeout { ticks });
            }
            let _ = self.tick(None);
            ticks += 1;
        }
        self.invalidate_done = false;
        Ok(())
    }

    /// Replays a trace.
    ///
    /// # Errors
    ///
    /// Returns the first `CacheError::Timeout` raised by a step.
    pub fn run_ops(&mut self, ops: &[TraceOp]) -> Result<TraceReport, CacheError> {
        let mut responses = Vec::new();
        for op in ops {
            if let Some(req) = op.request() {
                responses.push(self.run_request(&req)?);
                continue;
            }
            match *op {
                TraceOp::Invalidate => self.invalidate()?,
                TraceOp::ResetCounters => self.cache.reset_counters(),
                TraceOp::Drain => {
                    let _ = self.drain()?;
                }
                TraceOp::Idle { ticks } => {
                    for _ in 0..ticks {
                        let _ = self.tick(None);
                    }
                }
                TraceOp::Read { .. } | TraceOp::Write { .. } => {}
            }
        }
        info!(
            steps = ops.len(),
            cycles = self.cache.engine().stats().cycles,
            "trace replayed"
        );
        Ok(self.report(responses))
    }

    /// Snapshot of counters and statistics.
    pub fn report(&self, responses: Vec<Response>) -> TraceReport {
        TraceReport {
            responses,
            counters: *self.cache.counters(),
            stats: self.cache.engine().stats().clone(),
        }
    }

    /// The simulated cache.
    pub const fn cache(&self) -> &CacheController<B> {
        &self.cache
    }

    /// The simulated cache, mutably.
    pub const fn cache_mut(&mut self) -> &mut CacheController<B> {
        &mut self.cache
    }
}

impl Simulator<MainMemory> {
    /// Applies the trace's preload and replays its steps.
    ///
    /// # Errors
    ///
    /// Returns the first `CacheError::Timeout` raised by a step.
    pub fn run_trace(&mut self, trace: &Trace) -> Result<TraceReport, CacheError> {
        for word in &trace.preload {
            self.preload(word.addr, word.data);
        }
        self.run_ops(&trace.ops)
    }
}
