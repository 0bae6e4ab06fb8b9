//! Reference main-memory back end.
//!
//! Sparse word-addressed storage behind a [`MemoryController`] latency model.
//! A transaction takes the controller's latency for its first beat plus one cycle
//! for each further back-end beat (`line_bits / be_data_w` beats per line transfer,
//! one beat per drained word). Every accepted transaction is logged in order.

use std::collections::HashMap;

use super::controller::{self, MemoryController};
use super::{BackEnd, BackEndRequest, BackEndResponse};
use crate::common::data::merge_strobe;
use crate::config::CacheConfig;

#[derive(Debug)]
struct InFlight {
    req: BackEndRequest,
    remaining: u64,
}

/// Main memory responder.
#[derive(Debug)]
pub struct MainMemory {
    words: HashMap<u64, u64>,
    bytes_per_word: u64,
    word_mask: u64,
    beats_per_line: u64,
    controller: Box<dyn MemoryController>,
    in_flight: Option<InFlight>,
    log: Vec<BackEndRequest>,
}

impl MainMemory {
    /// Creates a zero-filled memory with the controller named in the configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_controller(config, controller::build(&config.back_end))
    }

    /// Creates a zero-filled memory with an explicit latency model.
    pub fn with_controller(config: &CacheConfig, controller: Box<dyn MemoryController>) -> Self {
        Self {
            words: HashMap::new(),
            bytes_per_word: u64::from(config.fe_nbytes()),
            word_mask: config.word_mask(),
            beats_per_line: config.beats_per_line(),
            controller,
            in_flight: None,
            log: Vec::new(),
        }
    }

    #[inline]
    const fn align(&self, addr: u64) -> u64 {
        addr & !(self.bytes_per_word - 1)
    }

    /// Reads the word containing `addr` directly, bypassing timing.
    pub fn read_word(&self, addr: u64) -> u64 {
        self.words.get(&self.align(addr)).copied().unwrap_or(0)
    }

    /// Writes the word containing `addr` directly, bypassing timing.
    pub fn write_word(&mut self, addr: u64, data: u64) {
        let _ = self.words.insert(self.align(addr), data & self.word_mask);
    }

    /// Every transaction accepted so far, in order.
    pub fn transactions(&self) -> &[BackEndRequest] {
        &self.log
    }

    /// Returns true while a transaction is outstanding.
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn complete(&mut self, req: BackEndRequest) -> BackEndResponse {
        match req {
            BackEndRequest::ReadLine { addr, words } => {
                let base = self.align(addr);
                let data = (0..words as u64)
                    .map(|i| self.read_word(base + i * self.bytes_per_word))
                    .collect();
                BackEndResponse::ReadAck(data)
            }
            BackEndRequest::WriteWord { addr, data, wstrb } => {
                let merged = merge_strobe(self.read_word(addr), data, wstrb);
                self.write_word(addr, merged);
                BackEndResponse::WriteAck
            }
            BackEndRequest::WriteLine { addr, data } => {
                let base = self.align(addr);
                for (i, word) in data.into_iter().enumerate() {
                    self.write_word(base + i as u64 * self.bytes_per_word, word);
                }
                BackEndResponse::WriteAck
            }
        }
    }
}

impl BackEnd for MainMemory {
    fn request(&mut self, req: BackEndRequest) {
        debug_assert!(self.in_flight.is_none(), "back end accepts one transaction");
        let beats = match req {
            BackEndRequest::WriteWord { .. } => 1,
            BackEndRequest::ReadLine { .. } | BackEndRequest::WriteLine { .. } => {
                self.beats_per_line
            }
        };
        let remaining = self.controller.access_latency(req.addr()) + beats.saturating_sub(1);
        self.log.push(req.clone());
        self.in_flight = Some(InFlight { req, remaining });
    }

    fn poll(&mut self) -> Option<BackEndResponse> {
        let flight = self.in_flight.as_mut()?;
        if flight.remaining > 0 {
            flight.remaining -= 1;
            return None;
        }
        let InFlight { req, .. } = self.in_flight.take()?;
        Some(self.complete(req))
    }
}
