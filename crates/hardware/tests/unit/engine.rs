//! # Cache Engine Tests
//!
//! Observable behavior of the state machine: hit/miss timing, data consistency,
//! write-through ordering and hazards, write-back eviction, and invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use cachesim_core::backend::{BackEnd, BackEndRequest, BackEndResponse, MainMemory};
use cachesim_core::cache::{CacheEngine, EngineState};
use cachesim_core::common::{AccessKind, AccessOutcome, ConfigError, Request, Response};
use cachesim_core::config::{CacheConfig, ReplacementPolicy, WritePolicy};
use cachesim_core::control::CacheController;
use mockall::Sequence;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use crate::common::harness::{
    LINE, SET_STRIDE, TestContext, init_tracing, small_config, write_back, write_through,
};
use crate::common::mocks::{DeadBackEnd, MockPort, answer_from_slot};

// ══════════════════════════════════════════════════════════
// Timing
// ══════════════════════════════════════════════════════════

#[test]
fn test_hit_acknowledged_on_second_tick() {
    let mut ctx = TestContext::new(&write_through());
    let _ = ctx.read(0x40);

    let req = Request::read(0x40);
    assert_eq!(ctx.sim.tick(Some(&req)), None);
    assert_eq!(ctx.engine().state(), EngineState::Lookup);
    let resp = ctx.sim.tick(Some(&req)).expect("hit on second tick");
    assert_eq!(resp.outcome, AccessOutcome::Hit);
    assert_eq!(ctx.engine().state(), EngineState::Idle);
}

#[test]
fn test_read_miss_waits_for_line() {
    // Latch, lookup, then 2 cycles of latency plus 3 extra beats before the ack.
    let mut ctx = TestContext::new(&write_through());
    let req = Request::read(0x40);
    let mut ticks = 0;
    let resp = loop {
        ticks += 1;
        if let Some(resp) = ctx.sim.tick(Some(&req)) {
            break resp;
        }
        if ticks > 2 {
            assert_eq!(ctx.engine().state(), EngineState::FillWait);
        }
    };
    assert_eq!(resp.outcome, AccessOutcome::Miss);
    assert_eq!(ticks, 8);
}

#[test]
fn test_outcome_decided_at_lookup() {
    let config = write_through();
    let mut engine = CacheEngine::new(&config, MainMemory::new(&config)).unwrap();
    let req = Request::read(0x40);
    let mut decisions = Vec::new();
    let resp = loop {
        let resp = engine.tick(Some(&req));
        if let Some(outcome) = engine.take_outcome() {
            decisions.push((engine.stats().cycles, engine.state(), outcome));
        }
        if let Some(resp) = resp {
            break resp;
        }
    };
    assert_eq!(resp.outcome, AccessOutcome::Miss);
    assert_eq!(
        decisions,
        [(2, EngineState::FillWait, (AccessKind::Read, AccessOutcome::Miss))]
    );
    // Taking clears it.
    assert_eq!(engine.take_outcome(), None);

    let _ = engine.tick(Some(&req));
    let hit = engine.tick(Some(&req)).expect("hit on second tick");
    assert!(hit.is_hit());
    assert_eq!(engine.take_outcome(), Some((AccessKind::Read, AccessOutcome::Hit)));
}

#[test]
fn test_idle_engine_ignores_no_request() {
    let mut ctx = TestContext::new(&write_through());
    for _ in 0..5 {
        assert_eq!(ctx.sim.tick(None), None);
    }
    assert_eq!(ctx.engine().stats().requests, 0);
    assert!(ctx.engine().is_quiescent());
}

// ══════════════════════════════════════════════════════════
// Data consistency
// ══════════════════════════════════════════════════════════

#[test]
fn test_miss_returns_memory_contents() {
    let mut ctx = TestContext::new(&write_through());
    ctx.preload(0x48, 0x1234);
    let resp = ctx.read(0x48);
    assert!(!resp.is_hit());
    assert_eq!(resp.rdata, 0x1234);
    // Neighbor word came in with the line.
    ctx.preload(0x4C, 0x9999);
    assert_eq!(ctx.read(0x4C).rdata, 0);
}

#[rstest]
#[case(WritePolicy::WriteThrough)]
#[case(WritePolicy::WriteBack)]
fn test_write_then_read_returns_data(#[case] write_pol: WritePolicy) {
    let mut ctx = TestContext::new(&small_config(ReplacementPolicy::Lru, write_pol));
    let _ = ctx.write(0x44, 0xDEAD);
    assert_eq!(ctx.read(0x44).rdata, 0xDEAD);
    let _ = ctx.write(0x44, 0xBEEF);
    assert_eq!(ctx.read(0x44).rdata, 0xBEEF);
}

#[rstest]
#[case(WritePolicy::WriteThrough)]
#[case(WritePolicy::WriteBack)]
fn test_byte_strobed_write(#[case] write_pol: WritePolicy) {
    let mut ctx = TestContext::new(&small_config(ReplacementPolicy::Lru, write_pol));
    let _ = ctx.read(0x20);
    let _ = ctx.write(0x20, 0x1122_3344);
    let _ = ctx
        .sim
        .run_request(&Request::write(0x20, 0xAABB_CCDD, 0b1001))
        .unwrap();
    assert_eq!(ctx.read(0x20).rdata, 0xAA22_33DD);
}

#[test]
fn test_write_data_truncated_to_word() {
    let mut ctx = TestContext::new(&write_back());
    let _ = ctx.write(0x10, 0xFFFF_0000_1234_5678);
    assert_eq!(ctx.read(0x10).rdata, 0x1234_5678);
}

#[derive(Clone, Debug)]
enum Access {
    Read(u64),
    Write(u64, u32),
}

fn addr() -> impl Strategy<Value = u64> {
    // Eight tags over two sets: plenty of conflicts for four ways.
    (0u64..8, 0u64..2, 0u64..4).prop_map(|(tag, set, word)| tag * SET_STRIDE + set * LINE + word * 4)
}

fn access() -> impl Strategy<Value = Access> {
    prop_oneof![
        addr().prop_map(Access::Read),
        (addr(), any::<u32>()).prop_map(|(a, d)| Access::Write(a, d)),
    ]
}

fn policy() -> impl Strategy<Value = ReplacementPolicy> {
    prop_oneof![
        Just(ReplacementPolicy::Lru),
        Just(ReplacementPolicy::PlruMru),
        Just(ReplacementPolicy::PlruTree),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_reads_return_last_write(
        rep in policy(),
        write_back in any::<bool>(),
        ops in prop::collection::vec(access(), 1..80),
    ) {
        let write_pol = if write_back { WritePolicy::WriteBack } else { WritePolicy::WriteThrough };
        let mut ctx = TestContext::new(&small_config(rep, write_pol));
        let mut model: HashMap<u64, u64> = HashMap::new();

        for op in ops {
            match op {
                Access::Read(a) => {
                    let resp = ctx.read(a);
                    prop_assert_eq!(resp.rdata, model.get(&a).copied().unwrap_or(0), "read {:#x}", a);
                }
                Access::Write(a, d) => {
                    let _ = ctx.write(a, u64::from(d));
                    let _ = model.insert(a, u64::from(d));
                }
            }
        }
    }

    #[test]
    fn prop_write_through_reaches_memory_in_order(
        writes in prop::collection::vec((addr(), any::<u32>()), 1..40),
    ) {
        let mut ctx = TestContext::new(&write_through());
        for &(a, d) in &writes {
            let _ = ctx.write(a, u64::from(d));
        }
        let _ = ctx.drain();

        let drained: Vec<(u64, u64)> = ctx
            .memory()
            .transactions()
            .iter()
            .filter_map(|t| match t {
                BackEndRequest::WriteWord { addr, data, .. } => Some((*addr, *data)),
                _ => None,
            })
            .collect();
        let expected: Vec<(u64, u64)> = writes.iter().map(|&(a, d)| (a, u64::from(d))).collect();
        prop_assert_eq!(drained, expected);
    }
}

// ══════════════════════════════════════════════════════════
// Write-through
// ══════════════════════════════════════════════════════════

#[test]
fn test_read_hit_stalls_until_write_drains() {
    let mut ctx = TestContext::new(&write_through());
    let _ = ctx.read(0x80);
    let _ = ctx.write(0x80, 5);
    assert!(!ctx.engine().write_buffer_empty());

    let mut held = 0;
    let resp = ctx.tick_until_ack(&Request::read(0x80), |ctx| {
        let undrained = ctx
            .engine()
            .write_buffer()
            .is_some_and(|b| b.peek_for_hazard(0x80));
        if undrained && ctx.engine().state() == EngineState::Lookup {
            // Latched, not yet acknowledged.
            held += 1;
        }
        assert!(
            !undrained || ctx.engine().state() != EngineState::Idle || held == 0,
            "read released while its write was undrained"
        );
    });
    assert!(held >= 1);
    assert!(resp.is_hit());
    assert_eq!(resp.rdata, 5);
    assert!(ctx.engine().write_buffer_empty());
    assert_eq!(ctx.memory().read_word(0x80), 5);
    assert!(ctx.engine().stats().hazard_stalls >= 1);
}

#[test]
fn test_read_miss_waits_for_writes_to_its_line() {
    let mut ctx = TestContext::new(&write_through());
    let _ = ctx.write(0x84, 7);
    // Different word, same line: the refill must see the write.
    let resp = ctx.tick_until_ack(&Request::read(0x80), |_| {});
    assert!(!resp.is_hit());
    assert!(ctx.engine().write_buffer_empty());
    assert_eq!(ctx.read(0x84).rdata, 7);
}

#[test]
fn test_write_miss_does_not_allocate() {
    let mut ctx = TestContext::new(&write_through());
    let resp = ctx.write(0x100, 3);
    assert_eq!(resp.outcome, AccessOutcome::Miss);
    assert_eq!(ctx.engine().tags().valid_count(), 0);
    let _ = ctx.drain();
    assert_eq!(ctx.memory().read_word(0x100), 3);
    assert!(!ctx.read(0x100).is_hit());
}

#[test]
fn test_write_hit_updates_line_and_memory() {
    let mut ctx = TestContext::new(&write_through());
    let _ = ctx.read(0x100);
    assert!(ctx.write(0x104, 11).is_hit());
    let _ = ctx.drain();
    assert_eq!(ctx.memory().read_word(0x104), 11);
    let line = ctx.engine().layout().decode(0x104);
    let way = ctx.engine().tags().lookup(line.set, line.tag).unwrap();
    assert_eq!(ctx.engine().data().read_word(line.set, way, line.word), 11);
    assert!(!ctx.engine().tags().entry(line.set, way).dirty);
}

#[test]
fn test_full_buffer_stalls_writes() {
    let mut config = write_through();
    config.wtbuf_depth_w = 1;
    config.back_end.latency = 20;
    let mut ctx = TestContext::new(&config);

    let _ = ctx.write(0x000, 1);
    let _ = ctx.write(0x100, 2);
    assert!(ctx.engine().write_buffer_full());
    assert_eq!(ctx.engine().write_buffer().map(|b| b.len()), Some(2));

    let _ = ctx.write(0x200, 3);
    assert!(ctx.engine().stats().buffer_full_stalls > 0);

    let _ = ctx.drain();
    assert_eq!(ctx.memory().read_word(0x000), 1);
    assert_eq!(ctx.memory().read_word(0x100), 2);
    assert_eq!(ctx.memory().read_word(0x200), 3);
    assert_eq!(ctx.engine().stats().drained_writes, 3);
}

// ══════════════════════════════════════════════════════════
// Write-back
// ══════════════════════════════════════════════════════════

#[test]
fn test_write_back_allocates_and_defers() {
    let mut ctx = TestContext::new(&write_back());
    assert_eq!(ctx.write(0x100, 7).outcome, AccessOutcome::Miss);
    assert_eq!(ctx.engine().tags().valid_count(), 1);
    assert_eq!(ctx.memory().read_word(0x100), 0);
    assert!(ctx.engine().write_buffer_empty());
    assert!(ctx.engine().write_buffer().is_none());

    let resp = ctx.read(0x100);
    assert!(resp.is_hit());
    assert_eq!(resp.rdata, 7);
}

#[test]
fn test_dirty_victim_written_back_before_refill() {
    let mut ctx = TestContext::new(&write_back());
    for tag in 0..4 {
        let _ = ctx.write(tag * SET_STRIDE, 100 + tag);
    }
    assert_eq!(ctx.engine().stats().writebacks, 0);

    // Fifth line of set 0 evicts tag 0.
    let _ = ctx.read(4 * SET_STRIDE);
    assert_eq!(ctx.engine().stats().writebacks, 1);
    assert_eq!(ctx.memory().read_word(0), 100);

    let kinds: Vec<&'static str> = ctx
        .memory()
        .transactions()
        .iter()
        .map(|t| match t {
            BackEndRequest::ReadLine { .. } => "read",
            BackEndRequest::WriteLine { .. } => "writeback",
            BackEndRequest::WriteWord { .. } => "word",
        })
        .collect();
    assert_eq!(kinds, ["read", "read", "read", "read", "writeback", "read"]);

    let resp = ctx.read(0);
    assert!(!resp.is_hit());
    assert_eq!(resp.rdata, 100);
}

#[test]
fn test_clean_victim_is_not_written_back() {
    let mut ctx = TestContext::new(&write_back());
    for tag in 0..5 {
        let _ = ctx.read(tag * SET_STRIDE);
    }
    assert_eq!(ctx.engine().stats().writebacks, 0);
    assert_eq!(ctx.engine().stats().fills, 5);
}

fn one_line_write_back() -> CacheConfig {
    CacheConfig {
        fe_addr_w: 16,
        nways_w: 0,
        nlines_w: 0,
        word_offset_w: 1,
        wtbuf_depth_w: 0,
        write_pol: WritePolicy::WriteBack,
        ..CacheConfig::default()
    }
}

fn run<B: BackEnd>(cache: &mut CacheController<B>, req: &Request) -> Response {
    for _ in 0..50 {
        if let Some(resp) = cache.tick(Some(req)) {
            return resp;
        }
    }
    panic!("no acknowledgement for {req:?}");
}

#[test]
fn test_eviction_transaction_sequence() {
    init_tracing();
    let mut port = MockPort::new();
    let slot = answer_from_slot(&mut port);
    let mut seq = Sequence::new();

    let script = [
        (
            BackEndRequest::ReadLine { addr: 0, words: 2 },
            BackEndResponse::ReadAck(vec![1, 2]),
        ),
        (
            BackEndRequest::WriteLine {
                addr: 0,
                data: vec![0xAA, 2],
            },
            BackEndResponse::WriteAck,
        ),
        (
            BackEndRequest::ReadLine { addr: 8, words: 2 },
            BackEndResponse::ReadAck(vec![5, 6]),
        ),
    ];
    for (expected, ack) in script {
        let slot = Arc::clone(&slot);
        let _ = port
            .expect_request()
            .withf(move |r| *r == expected)
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| *slot.lock().unwrap() = Some(ack.clone()));
    }

    let mut cache = CacheController::new(&one_line_write_back(), port).unwrap();
    let first = run(&mut cache, &Request::write_word(0x0, 0xAA));
    assert_eq!(first.outcome, AccessOutcome::Miss);
    assert!(cache.engine().tags().entry(0, 0).dirty);

    let second = run(&mut cache, &Request::read(0x8));
    assert_eq!(second.outcome, AccessOutcome::Miss);
    assert_eq!(second.rdata, 5);
    assert!(!cache.engine().tags().entry(0, 0).dirty);
}

#[test]
#[should_panic(expected = "unsolicited")]
fn test_unsolicited_acknowledgement_panics() {
    let mut port = MockPort::new();
    let _ = port
        .expect_poll()
        .returning(|| Some(BackEndResponse::WriteAck));
    let mut engine = CacheEngine::new(&write_through(), port).unwrap();
    let _ = engine.tick(None);
}

// ══════════════════════════════════════════════════════════
// Invalidation
// ══════════════════════════════════════════════════════════

#[test]
fn test_invalidate_on_empty_cache_changes_nothing() {
    let mut ctx = TestContext::new(&write_through());
    let cache = ctx.sim.cache_mut();
    assert!(cache.invalidate(true));
    assert!(cache.take_invalidate_out());
    assert!(!cache.take_invalidate_out());
    assert_eq!(cache.engine().tags().valid_count(), 0);
    assert_eq!(*cache.counters(), Default::default());
    assert!(cache.engine().write_buffer_empty());
}

#[rstest]
#[case(ReplacementPolicy::Lru)]
#[case(ReplacementPolicy::PlruMru)]
#[case(ReplacementPolicy::PlruTree)]
fn test_invalidate_after_fills(#[case] rep: ReplacementPolicy) {
    let mut ctx = TestContext::new(&small_config(rep, WritePolicy::WriteThrough));
    for a in [0x00, 0x10, 0x40, 0x80] {
        let _ = ctx.read(a);
    }
    assert_eq!(ctx.engine().tags().valid_count(), 4);

    ctx.sim.invalidate().unwrap();
    assert_eq!(ctx.engine().tags().valid_count(), 0);
    assert_eq!(ctx.engine().stats().invalidations, 1);
    for a in [0x00, 0x10, 0x40, 0x80] {
        assert!(!ctx.read(a).is_hit());
    }
    // Replacement state started over: the first refill of set 0 went to way 0.
    let d = ctx.engine().layout().decode(0x00);
    assert_eq!(ctx.engine().tags().lookup(d.set, d.tag), Some(0));
}

#[test]
fn test_invalidate_deferred_while_fill_outstanding() {
    let mut ctx = TestContext::new(&write_through());
    ctx.preload(0x40, 42);
    let cache = ctx.sim.cache_mut();
    let req = Request::read(0x40);

    assert!(cache.tick(Some(&req)).is_none());
    assert!(cache.tick(Some(&req)).is_none());
    assert_eq!(cache.engine().state(), EngineState::FillWait);

    assert!(!cache.invalidate(true));
    assert!(cache.engine().invalidate_pending());
    assert!(!cache.take_invalidate_out());

    let resp = loop {
        if let Some(resp) = cache.tick(Some(&req)) {
            break resp;
        }
    };
    assert_eq!(resp.rdata, 42);
    assert!(!cache.engine().invalidate_pending());
    assert!(cache.take_invalidate_out());
    assert_eq!(cache.engine().tags().valid_count(), 0);
}

#[test]
fn test_invalidate_drops_dirty_lines() {
    let mut ctx = TestContext::new(&write_back());
    let _ = ctx.write(0x30, 9);
    ctx.sim.invalidate().unwrap();
    assert_eq!(ctx.read(0x30).rdata, 0);
}

#[test]
fn test_invalidate_keeps_write_buffer() {
    let mut ctx = TestContext::new(&write_through());
    let _ = ctx.write(0x30, 9);
    assert!(ctx.sim.cache_mut().invalidate(true));
    assert!(!ctx.engine().write_buffer_empty());
    let _ = ctx.drain();
    assert_eq!(ctx.read(0x30).rdata, 9);
}

// ══════════════════════════════════════════════════════════
// Construction and statistics
// ══════════════════════════════════════════════════════════

#[test]
fn test_invalid_config_rejected_before_construction() {
    let config = CacheConfig {
        fe_data_w: 20,
        ..CacheConfig::default()
    };
    let err = CacheEngine::new(&config, DeadBackEnd::default()).unwrap_err();
    assert_eq!(err, ConfigError::FrontEndDataWidth(20));
}

#[test]
fn test_stats_track_activity() {
    let mut ctx = TestContext::new(&write_through());
    let _ = ctx.read(0x40);
    let _ = ctx.read(0x44);
    let _ = ctx.write(0x48, 1);
    let _ = ctx.drain();

    let stats = ctx.engine().stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.fills, 1);
    assert_eq!(stats.drained_writes, 1);
    assert_eq!(stats.writebacks, 0);
    assert!(stats.backend_wait_cycles >= 5);
    assert!(stats.cycles > stats.backend_wait_cycles);
}
