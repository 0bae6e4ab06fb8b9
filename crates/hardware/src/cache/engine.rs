//! Cache engine state machine.
//!
//! The engine owns the tag and data stores, the replacement policy, the write path
//! and the back-end port. Each call to [`CacheEngine::tick`] advances it one clock:
//! 1. **Back end:** poll the outstanding transaction and apply its acknowledgement
//!    (drain done, writeback done, or refill data arrived).
//! 2. **Invalidate:** apply a latched invalidate if no fill or writeback is outstanding.
//! 3. **Front end:** latch a request in IDLE, or evaluate the latched request in LOOKUP.
//! 4. **Arbitration:** when the port is idle, start the next transaction. A victim
//!    writeback goes first, then the refill, then the oldest write-through entry.
//!
//! The outcome of a request is reported through [`CacheEngine::take_outcome`] on
//! the tick it is decided: in LOOKUP for hits, write-through write misses and the
//! start of a refill.
//!
//! A hit is acknowledged on the tick after the request is latched. Misses spend
//! FILL_WAIT (and, for a dirty victim, WRITEBACK_WAIT) on the back end and are
//! acknowledged on the tick the refill data arrives.
//!
//! Write-through is write-no-allocate: a write miss only queues the write. Write-back
//! is write-allocate: a write miss refills the line and then merges the write.

use std::fmt;
use std::mem;

use tracing::{debug, info, trace};

use super::data_store::DataStore;
use super::policies::{self, ReplacementPolicy};
use super::tag_store::TagStore;
use super::write_buffer::{WriteBufferEntry, WriteThroughBuffer};
use crate::backend::{BackEnd, BackEndRequest, BackEndResponse};
use crate::common::addr::{AddressLayout, DecodedAddr, low_mask};
use crate::common::data::{AccessKind, AccessOutcome, Request, Response};
use crate::common::error::ConfigError;
use crate::config::{CacheConfig, WritePolicy};
use crate::stats::CacheStats;

/// Controller states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Waiting for a front-end request.
    Idle,
    /// Evaluating the latched request against the tag store.
    Lookup,
    /// Waiting for refill data from the back end.
    FillWait,
    /// Waiting for the back end to accept a dirty victim.
    WritebackWait,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Lookup => "LOOKUP",
            Self::FillWait => "FILL_WAIT",
            Self::WritebackWait => "WRITEBACK_WAIT",
        };
        f.write_str(name)
    }
}

/// Which engine activity owns the back-end port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PortOwner {
    Drain,
    Writeback,
    Fill,
}

/// The write policy, fixed at construction.
#[derive(Clone, Debug)]
enum WritePath {
    Through(WriteThroughBuffer),
    Back,
}

/// The request being worked on.
#[derive(Clone, Copy, Debug)]
struct Pending {
    req: Request,
    decoded: DecodedAddr,
    /// Way chosen on the miss; fixed until the refill installs.
    victim: usize,
    /// Whether the transaction of the current wait state has been issued.
    issued: bool,
}

/// The cache controller.
///
/// Generic over its back end so the reference memory, a mock, or a lower cache
/// level can sit behind it.
#[derive(Debug)]
pub struct CacheEngine<B: BackEnd> {
    config: CacheConfig,
    layout: AddressLayout,
    tags: TagStore,
    data: DataStore,
    policy: Box<dyn ReplacementPolicy>,
    write_path: WritePath,
    back_end: B,
    state: EngineState,
    pending: Option<Pending>,
    port: Option<PortOwner>,
    invalidate_pending: bool,
    invalidate_out: bool,
    outcome: Option<(AccessKind, AccessOutcome)>,
    word_mask: u64,
    strobe_mask: u8,
    stats: CacheStats,
}

impl<B: BackEnd> CacheEngine<B> {
    /// Builds an engine after validating the configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Cache parameters; checked before anything is allocated.
    /// * `back_end` - Memory-side responder.
    ///
    /// # Errors
    ///
    /// Returns the first constraint the configuration violates.
    pub fn new(config: &CacheConfig, back_end: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let sets = config.sets();
        let ways = config.ways();
        let write_path = match config.write_pol {
            WritePolicy::WriteThrough => {
                WritePath::Through(WriteThroughBuffer::new(config.wtb_capacity()))
            }
            WritePolicy::WriteBack => WritePath::Back,
        };
        debug!(
            sets,
            ways,
            words_per_line = config.words_per_line(),
            policy = ?config.rep_policy,
            write_pol = ?config.write_pol,
            "cache engine built"
        );
        Ok(Self {
            config: config.clone(),
            layout: AddressLayout::from_config(config),
            tags: TagStore::new(sets, ways),
            data: DataStore::new(sets, ways, config.words_per_line(), config.word_mask()),
            policy: policies::build(config.rep_policy, sets, ways),
            write_path,
            back_end,
            state: EngineState::Idle,
            pending: None,
            port: None,
            invalidate_pending: false,
            invalidate_out: false,
            outcome: None,
            word_mask: config.word_mask(),
            strobe_mask: low_mask(config.fe_nbytes()) as u8,
            stats: CacheStats::default(),
        })
    }

    /// Advances the engine one clock.
    ///
    /// `req` is the request the front end is presenting on this tick. The front end
    /// must keep presenting the same request until it is acknowledged; the engine
    /// only looks at it while IDLE.
    ///
    /// # Returns
    ///
    /// The acknowledgement, on the tick the request resolves.
    pub fn tick(&mut self, req: Option<&Request>) -> Option<Response> {
        self.stats.cycles += 1;
        self.outcome = None;

        let mut response = self.poll_back_end();

        if self.invalidate_pending && self.can_invalidate() {
            self.apply_invalidate();
        }

        match self.state {
            EngineState::Idle => {
                if response.is_none() {
                    if let Some(req) = req {
                        self.latch(req);
                    }
                }
            }
            EngineState::Lookup => response = self.lookup(),
            EngineState::FillWait | EngineState::WritebackWait => {
                self.stats.backend_wait_cycles += 1;
            }
        }

        if self.port.is_none() {
            self.arbitrate();
        }
        response
    }

    fn latch(&mut self, req: &Request) {
        let mut req = *req;
        req.addr = self.layout.mask(req.addr);
        req.wdata &= self.word_mask;
        req.wstrb &= self.strobe_mask;
        let decoded = self.layout.decode(req.addr);
        self.pending = Some(Pending {
            req,
            decoded,
            victim: 0,
            issued: false,
        });
        self.stats.requests += 1;
        self.state = EngineState::Lookup;
    }

    fn lookup(&mut self) -> Option<Response> {
        let mut pending = self.pending?;
        let req = pending.req;
        let DecodedAddr { tag, set, word, .. } = pending.decoded;
        let hit_way = self.tags.lookup(set, tag);

        match (req.kind, hit_way) {
            (AccessKind::Read, Some(way)) => {
                if let WritePath::Through(wtb) = &self.write_path {
                    if wtb.peek_for_hazard(self.layout.word_addr(req.addr)) {
                        trace!(addr = req.addr, "read stalled on undrained write");
                        self.stats.hazard_stalls += 1;
                        return None;
                    }
                }
                let rdata = self.data.read_word(set, way, word);
                self.policy.on_access(set, way);
                self.outcome = Some((req.kind, AccessOutcome::Hit));
                Some(self.finish(AccessOutcome::Hit, rdata))
            }
            (AccessKind::Write, Some(way)) => {
                match &mut self.write_path {
                    WritePath::Through(wtb) => {
                        let entry = WriteBufferEntry {
                            addr: self.layout.word_addr(req.addr),
                            data: req.wdata,
                            wstrb: req.wstrb,
                        };
                        if !wtb.enqueue(entry) {
                            trace!(addr = req.addr, "write hit stalled on full buffer");
                            self.stats.buffer_full_stalls += 1;
                            return None;
                        }
                    }
                    WritePath::Back => self.tags.mark_dirty(set, way),
                }
                self.data.write_word(set, way, word, req.wdata, req.wstrb);
                self.policy.on_access(set, way);
                self.outcome = Some((req.kind, AccessOutcome::Hit));
                Some(self.finish(AccessOutcome::Hit, 0))
            }
            (AccessKind::Write, None) if matches!(self.write_path, WritePath::Through(_)) => {
                let entry = WriteBufferEntry {
                    addr: self.layout.word_addr(req.addr),
                    data: req.wdata,
                    wstrb: req.wstrb,
                };
                if let WritePath::Through(wtb) = &mut self.write_path {
                    if !wtb.enqueue(entry) {
                        trace!(addr = req.addr, "write miss stalled on full buffer");
                        self.stats.buffer_full_stalls += 1;
                        return None;
                    }
                }
                self.outcome = Some((req.kind, AccessOutcome::Miss));
                Some(self.finish(AccessOutcome::Miss, 0))
            }
            (_, None) => {
                if let WritePath::Through(wtb) = &self.write_path {
                    let line = self.layout.line_addr(req.addr);
                    if wtb.any_pending(|e| self.layout.line_addr(e.addr) == line) {
                        trace!(addr = req.addr, "refill stalled on undrained write to line");
                        self.stats.hazard_stalls += 1;
                        return None;
                    }
                }
                let victim = self.policy.select_victim(set);
                let occupant = *self.tags.entry(set, victim);
                pending.victim = victim;
                pending.issued = false;
                self.pending = Some(pending);
                self.outcome = Some((req.kind, AccessOutcome::Miss));
                if occupant.valid && occupant.dirty {
                    debug!(addr = req.addr, set, victim, "miss, dirty victim");
                    self.state = EngineState::WritebackWait;
                } else {
                    debug!(addr = req.addr, set, victim, "miss");
                    self.state = EngineState::FillWait;
                }
                None
            }
        }
    }

    fn finish(&mut self, outcome: AccessOutcome, rdata: u64) -> Response {
        self.state = EngineState::Idle;
        let req = self.pending.take().map_or(Request::read(0), |p| p.req);
        Response {
            kind: req.kind,
            addr: req.addr,
            rdata,
            outcome,
        }
    }

    fn poll_back_end(&mut self) -> Option<Response> {
        let ack = self.back_end.poll()?;
        let Some(owner) = self.port.take() else {
            panic!("unsolicited back-end acknowledgement {ack:?}");
        };
        match (owner, ack) {
            (PortOwner::Drain, BackEndResponse::WriteAck) => {
                if let WritePath::Through(wtb) = &mut self.write_path {
                    let _ = wtb.dequeue();
                }
                self.stats.drained_writes += 1;
                None
            }
            (PortOwner::Writeback, BackEndResponse::WriteAck) => {
                if let Some(p) = self.pending.as_mut() {
                    let DecodedAddr { set, .. } = p.decoded;
                    self.tags.clear_dirty(set, p.victim);
                    p.issued = false;
                    debug!(set, victim = p.victim, "writeback done");
                }
                self.stats.writebacks += 1;
                self.state = EngineState::FillWait;
                None
            }
            (PortOwner::Fill, BackEndResponse::ReadAck(line)) => Some(self.complete_fill(&line)),
            (owner, ack) => panic!("back end answered {owner:?} transaction with {ack:?}"),
        }
    }

    fn complete_fill(&mut self, line: &[u64]) -> Response {
        let Some(p) = self.pending else {
            panic!("refill data arrived with no request outstanding");
        };
        let DecodedAddr { tag, set, word, .. } = p.decoded;
        let way = p.victim;
        self.data.fill_line(set, way, line);
        self.tags.install(set, way, tag);
        self.policy.on_access(set, way);
        self.stats.fills += 1;
        debug!(addr = p.req.addr, set, way, "line installed");

        let rdata = match p.req.kind {
            AccessKind::Read => self.data.read_word(set, way, word),
            AccessKind::Write => {
                self.data.write_word(set, way, word, p.req.wdata, p.req.wstrb);
                self.tags.mark_dirty(set, way);
                0
            }
        };
        self.finish(AccessOutcome::Miss, rdata)
    }

    fn arbitrate(&mut self) {
        let Some(p) = self.pending.as_mut() else {
            self.issue_drain();
            return;
        };
        let DecodedAddr { tag, set, .. } = p.decoded;
        match self.state {
            EngineState::WritebackWait if !p.issued => {
                p.issued = true;
                let occupant = self.tags.entry(set, p.victim);
                let addr = self.layout.line_base(occupant.tag, set);
                let data = self.data.line(set, p.victim).to_vec();
                self.back_end.request(BackEndRequest::WriteLine { addr, data });
                self.port = Some(PortOwner::Writeback);
            }
            EngineState::FillWait if !p.issued => {
                p.issued = true;
                let addr = self.layout.line_base(tag, set);
                self.back_end.request(BackEndRequest::ReadLine {
                    addr,
                    words: self.layout.words_per_line(),
                });
                self.port = Some(PortOwner::Fill);
            }
            _ => self.issue_drain(),
        }
    }

    fn issue_drain(&mut self) {
        let WritePath::Through(wtb) = &self.write_path else {
            return;
        };
        if let Some(entry) = wtb.front() {
            self.back_end.request(BackEndRequest::WriteWord {
                addr: entry.addr,
                data: entry.data,
                wstrb: entry.wstrb,
            });
            self.port = Some(PortOwner::Drain);
        }
    }

    const fn can_invalidate(&self) -> bool {
        matches!(self.state, EngineState::Idle | EngineState::Lookup)
    }

    fn apply_invalidate(&mut self) {
        self.tags.invalidate_all();
        self.policy.reset_all();
        self.invalidate_pending = false;
        self.invalidate_out = true;
        self.stats.invalidations += 1;
        info!(cycle = self.stats.cycles, "cache invalidated");
    }

    /// Requests a global invalidate.
    ///
    /// A request is latched and applied as soon as no fill or writeback is
    /// outstanding, either here or by a later [`tick`](Self::tick). Calling with
    /// `false` only retries a latched request.
    ///
    /// # Returns
    ///
    /// True if the invalidate was applied by this call.
    pub fn invalidate(&mut self, invalidate_i: bool) -> bool {
        self.invalidate_pending |= invalidate_i;
        if self.invalidate_pending && self.can_invalidate() {
            self.apply_invalidate();
            true
        } else {
            false
        }
    }

    /// Returns true while an invalidate is latched but not yet applied.
    pub const fn invalidate_pending(&self) -> bool {
        self.invalidate_pending
    }

    /// Returns and clears the invalidate-done pulse.
    pub fn take_invalidate_out(&mut self) -> bool {
        mem::take(&mut self.invalidate_out)
    }

    /// Returns and clears the hit/miss decision made on the last tick.
    ///
    /// Each request yields exactly one decision. For a refill it is raised when
    /// the miss is found, not when the data arrives.
    pub const fn take_outcome(&mut self) -> Option<(AccessKind, AccessOutcome)> {
        self.outcome.take()
    }

    /// True once every write-through write has been acknowledged by the back end.
    /// Always true for write-back.
    pub fn write_buffer_empty(&self) -> bool {
        match &self.write_path {
            WritePath::Through(wtb) => wtb.is_empty(),
            WritePath::Back => true,
        }
    }

    /// True while the write-through buffer cannot take another write.
    pub fn write_buffer_full(&self) -> bool {
        match &self.write_path {
            WritePath::Through(wtb) => wtb.is_full(),
            WritePath::Back => false,
        }
    }

    /// The write-through buffer, if the cache is write-through.
    pub const fn write_buffer(&self) -> Option<&WriteThroughBuffer> {
        match &self.write_path {
            WritePath::Through(wtb) => Some(wtb),
            WritePath::Back => None,
        }
    }

    /// Current controller state.
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// True when no request is in flight and the port is idle.
    pub const fn is_quiescent(&self) -> bool {
        matches!(self.state, EngineState::Idle) && self.port.is_none()
    }

    /// The configuration the engine was built with.
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Address slicing used by the engine.
    pub const fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    /// Tag memory.
    pub const fn tags(&self) -> &TagStore {
        &self.tags
    }

    /// Data memory.
    pub const fn data(&self) -> &DataStore {
        &self.data
    }

    /// Replacement state.
    pub fn policy(&self) -> &dyn ReplacementPolicy {
        self.policy.as_ref()
    }

    /// Back-end responder.
    pub const fn back_end(&self) -> &B {
        &self.back_end
    }

    /// Back-end responder, mutably (e.g. to preload memory).
    pub const fn back_end_mut(&mut self) -> &mut B {
        &mut self.back_end
    }

    /// Activity counters.
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
