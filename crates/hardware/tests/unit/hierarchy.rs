//! # Multi-Level Tests
//!
//! Two caches stacked through the next-level adapter over main memory.

use cachesim_core::backend::MainMemory;
use cachesim_core::common::{ConfigError, Request};
use cachesim_core::config::{BackEndConfig, CacheConfig, ReplacementPolicy, WritePolicy};
use cachesim_core::control::CacheController;
use cachesim_core::hierarchy::{self, NextLevel};
use cachesim_core::sim::Simulator;
use pretty_assertions::assert_eq;

use crate::common::harness::{SET_STRIDE, init_tracing, small_config, write_back, write_through};

type TwoLevel = Simulator<NextLevel<MainMemory>>;

/// 2 ways, 8 sets, 8-word lines.
fn l2_config() -> CacheConfig {
    CacheConfig {
        fe_addr_w: 16,
        fe_data_w: 32,
        be_data_w: 32,
        nways_w: 1,
        nlines_w: 3,
        word_offset_w: 3,
        wtbuf_depth_w: 3,
        rep_policy: ReplacementPolicy::Lru,
        write_pol: WritePolicy::WriteThrough,
        back_end: BackEndConfig {
            latency: 2,
            ..BackEndConfig::default()
        },
        use_ctrl_cnt: true,
    }
}

fn two_level(l1: &CacheConfig) -> TwoLevel {
    init_tracing();
    let l2 = l2_config();
    let lower = CacheController::new(&l2, MainMemory::new(&l2)).unwrap();
    let adapter = NextLevel::new(lower, l1).unwrap();
    Simulator::new(CacheController::new(l1, adapter).unwrap()).with_timeout(10_000)
}

fn l2(sim: &TwoLevel) -> &CacheController<MainMemory> {
    sim.cache().engine().back_end().cache()
}

fn memory(sim: &TwoLevel) -> &MainMemory {
    l2(sim).engine().back_end()
}

fn preload(sim: &mut TwoLevel, addr: u64, data: u64) {
    sim.cache_mut()
        .engine_mut()
        .back_end_mut()
        .cache_mut()
        .engine_mut()
        .back_end_mut()
        .write_word(addr, data);
}

#[test]
fn test_read_through_both_levels() {
    let mut sim = two_level(&write_through());
    preload(&mut sim, 0x104, 77);

    let resp = sim.run_request(&Request::read(0x104)).unwrap();
    assert!(!resp.is_hit());
    assert_eq!(resp.rdata, 77);
    assert_eq!(sim.cache().engine().tags().valid_count(), 1);
    assert_eq!(l2(&sim).engine().tags().valid_count(), 1);
    // One lower-level read per word of the upper line.
    assert_eq!(l2(&sim).engine().stats().requests, 4);
    assert_eq!(l2(&sim).counters().read_miss, 1);
    assert_eq!(l2(&sim).counters().read_hit, 3);

    let again = sim.run_request(&Request::read(0x108)).unwrap();
    assert!(again.is_hit());
    assert_eq!(l2(&sim).engine().stats().requests, 4);
}

#[test]
fn test_buffer_status_is_anded_across_levels() {
    let mut sim = two_level(&write_through());
    let _ = sim
        .run_request(&Request::write_word(0x200, 5))
        .unwrap();
    assert!(!hierarchy::write_buffer_empty(sim.cache()));

    let mut ticks = 0;
    while !sim.cache().write_buffer_empty() {
        let _ = sim.tick(None);
        ticks += 1;
        assert!(ticks < 100, "upper buffer never drained");
    }
    // The write now sits in the lower level's buffer.
    assert!(!l2(&sim).write_buffer_empty());
    assert!(!hierarchy::write_buffer_empty(sim.cache()));

    let _ = sim.drain().unwrap();
    assert!(hierarchy::write_buffer_empty(sim.cache()));
    assert_eq!(memory(&sim).read_word(0x200), 5);
}

#[test]
fn test_invalidate_reaches_every_level() {
    let mut sim = two_level(&write_through());
    for a in [0x000, 0x040, 0x100] {
        let _ = sim.run_request(&Request::read(a)).unwrap();
    }
    assert!(l2(&sim).engine().tags().valid_count() > 0);

    sim.invalidate().unwrap();
    assert_eq!(sim.cache().engine().tags().valid_count(), 0);
    assert_eq!(l2(&sim).engine().tags().valid_count(), 0);
    assert_eq!(sim.cache().engine().stats().invalidations, 1);
    assert_eq!(l2(&sim).engine().stats().invalidations, 1);
}

#[test]
fn test_propagate_invalidate_on_idle_stack() {
    let mut sim = two_level(&write_through());
    let _ = sim.run_request(&Request::read(0x40)).unwrap();

    assert!(hierarchy::propagate_invalidate(sim.cache_mut(), true));
    assert_eq!(l2(&sim).engine().tags().valid_count(), 0);
    // Nothing further to pass down.
    assert!(!hierarchy::propagate_invalidate(sim.cache_mut(), false));
}

#[test]
fn test_depth() {
    let sim = two_level(&write_through());
    assert_eq!(hierarchy::depth(sim.cache()), 2);

    let single = CacheController::new(&write_through(), MainMemory::new(&write_through())).unwrap();
    assert_eq!(hierarchy::depth(&single), 1);
    assert!(hierarchy::write_buffer_empty(&single));
}

#[test]
fn test_dirty_eviction_written_through_lower_level() {
    let mut sim = two_level(&write_back());
    for tag in 0..5 {
        let _ = sim
            .run_request(&Request::write_word(tag * SET_STRIDE, 100 + tag))
            .unwrap();
    }
    assert_eq!(sim.cache().engine().stats().writebacks, 1);

    let _ = sim.drain().unwrap();
    assert_eq!(memory(&sim).read_word(0), 100);
    let resp = sim.run_request(&Request::read(0)).unwrap();
    assert_eq!(resp.rdata, 100);
}

#[test]
fn test_mismatched_word_width_rejected() {
    let lower_config = CacheConfig {
        fe_data_w: 64,
        be_data_w: 64,
        ..l2_config()
    };
    let lower = CacheController::new(&lower_config, MainMemory::new(&lower_config)).unwrap();
    let err = NextLevel::new(lower, &small_config(ReplacementPolicy::Lru, WritePolicy::WriteThrough))
        .unwrap_err();
    assert_eq!(err, ConfigError::LevelWidthMismatch { upper: 32, lower: 64 });
}
