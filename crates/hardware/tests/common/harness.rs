use cachesim_core::backend::MainMemory;
use cachesim_core::cache::CacheEngine;
use cachesim_core::common::{Request, Response};
use cachesim_core::config::{
    BackEndConfig, CacheConfig, MemoryController, ReplacementPolicy, WritePolicy,
};
use cachesim_core::control::HitMissCounters;
use cachesim_core::sim::Simulator;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Line size in bytes of [`small_config`].
pub const LINE: u64 = 16;

/// Distance between two lines that map to the same set in [`small_config`].
pub const SET_STRIDE: u64 = 64;

/// 4 ways, 4 sets, 4 words of 32 bits per line, 16-bit addresses, 4-entry
/// write-through buffer, 2-cycle memory.
pub fn small_config(rep_policy: ReplacementPolicy, write_pol: WritePolicy) -> CacheConfig {
    CacheConfig {
        fe_addr_w: 16,
        fe_data_w: 32,
        be_data_w: 32,
        nways_w: 2,
        nlines_w: 2,
        word_offset_w: 2,
        wtbuf_depth_w: 2,
        rep_policy,
        write_pol,
        back_end: BackEndConfig {
            controller: MemoryController::Simple,
            latency: 2,
            ..BackEndConfig::default()
        },
        use_ctrl_cnt: true,
    }
}

/// [`small_config`] with LRU replacement and write-through.
pub fn write_through() -> CacheConfig {
    small_config(ReplacementPolicy::Lru, WritePolicy::WriteThrough)
}

/// [`small_config`] with LRU replacement and write-back.
pub fn write_back() -> CacheConfig {
    small_config(ReplacementPolicy::Lru, WritePolicy::WriteBack)
}

/// A simulator over main memory with shorthand accessors.
pub struct TestContext {
    pub sim: Simulator<MainMemory>,
}

impl TestContext {
    pub fn new(config: &CacheConfig) -> Self {
        init_tracing();
        let sim = Simulator::from_config(config)
            .expect("test configuration must be valid")
            .with_timeout(1_000);
        Self { sim }
    }

    pub fn read(&mut self, addr: u64) -> Response {
        self.sim
            .run_request(&Request::read(addr))
            .expect("read timed out")
    }

    pub fn write(&mut self, addr: u64, data: u64) -> Response {
        self.sim
            .run_request(&Request::write_word(addr, data))
            .expect("write timed out")
    }

    pub fn drain(&mut self) -> u64 {
        self.sim.drain().expect("drain timed out")
    }

    pub fn preload(&mut self, addr: u64, data: u64) {
        self.sim.preload(addr, data);
    }

    pub fn engine(&self) -> &CacheEngine<MainMemory> {
        self.sim.cache().engine()
    }

    pub fn memory(&self) -> &MainMemory {
        self.engine().back_end()
    }

    pub fn counters(&self) -> HitMissCounters {
        *self.sim.cache().counters()
    }

    /// Ticks the simulator with `req` presented until it is acknowledged,
    /// calling `check` before every tick.
    pub fn tick_until_ack(&mut self, req: &Request, mut check: impl FnMut(&Self)) -> Response {
        for _ in 0..1_000 {
            check(self);
            if let Some(resp) = self.sim.tick(Some(req)) {
                return resp;
            }
        }
        panic!("request {req:?} never acknowledged");
    }
}
