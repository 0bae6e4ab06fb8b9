//! Latency models for the reference back end.
//!
//! Main memory asks its controller how long the first beat of each transaction
//! takes; every further beat of a line burst costs one more cycle. Two models
//! are provided:
//! 1. **Simple:** the same latency for every transaction.
//! 2. **DRAM:** a single open row; a transaction to the open row pays CAS only,
//!    a closed bank pays RAS + CAS and a row conflict adds precharge.

use std::fmt;

use crate::common::addr::low_mask;
use crate::config::{BackEndConfig, MemoryController as ControllerKind};

/// Reports first-beat latency of back-end transactions.
pub trait MemoryController: Send + Sync + fmt::Debug {
    /// Cycles until the first beat at `addr` is available.
    ///
    /// Called once per transaction, in issue order; stateful models update their
    /// state here.
    fn access_latency(&mut self, addr: u64) -> u64;
}

/// Builds the model selected by `config.controller`.
pub fn build(config: &BackEndConfig) -> Box<dyn MemoryController> {
    match config.controller {
        ControllerKind::Simple => Box::new(SimpleController::new(config.latency)),
        ControllerKind::Dram => Box::new(DramController::from_config(config)),
    }
}

/// Fixed latency.
#[derive(Clone, Debug)]
pub struct SimpleController {
    latency: u64,
}

impl SimpleController {
    /// A model where every transaction waits `latency` cycles.
    pub const fn new(latency: u64) -> Self {
        Self { latency }
    }
}

impl MemoryController for SimpleController {
    fn access_latency(&mut self, _addr: u64) -> u64 {
        self.latency
    }
}

/// Open-row DRAM timing.
#[derive(Clone, Debug)]
pub struct DramController {
    open_row: Option<u64>,
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
    row_bytes_w: u32,
}

impl DramController {
    /// Creates a model with the bank closed.
    ///
    /// # Arguments
    ///
    /// * `t_cas` - Column access cycles, paid by every transaction.
    /// * `t_ras` - Row activation cycles, paid when the addressed row is not open.
    /// * `t_pre` - Precharge cycles, paid when a different row has to be closed first.
    /// * `row_bytes_w` - log2 of the row size in bytes.
    pub const fn new(t_cas: u64, t_ras: u64, t_pre: u64, row_bytes_w: u32) -> Self {
        Self {
            open_row: None,
            t_cas,
            t_ras,
            t_pre,
            row_bytes_w,
        }
    }

    /// Takes the timing from the back-end configuration.
    pub const fn from_config(config: &BackEndConfig) -> Self {
        Self::new(config.t_cas, config.t_ras, config.t_pre, config.row_bytes_w)
    }

    /// Row currently held open, if any.
    pub const fn open_row(&self) -> Option<u64> {
        self.open_row
    }

    const fn row_of(&self, addr: u64) -> u64 {
        addr & !low_mask(self.row_bytes_w)
    }
}

impl MemoryController for DramController {
    fn access_latency(&mut self, addr: u64) -> u64 {
        let row = self.row_of(addr);
        let latency = match self.open_row {
            Some(open) if open == row => return self.t_cas,
            Some(_) => self.t_pre + self.t_ras + self.t_cas,
            None => self.t_ras + self.t_cas,
        };
        self.open_row = Some(row);
        latency
    }
}
