//! Simulation statistics collection and reporting.
//!
//! This module tracks what the engine spent its cycles on. It provides:
//! 1. **Cycles and requests:** Total ticks and front-end requests latched.
//! 2. **Stalls:** LOOKUP stalls on read-after-write hazards and on a full
//!    write-through buffer, and ticks spent waiting on the back end.
//! 3. **Back-end traffic:** Refills, victim writebacks and drained writes.
//! 4. **Control:** Invalidations applied.
//!
//! Hit and miss counts are kept by the control interface, not here.

use serde::Serialize;

use crate::control::HitMissCounters;

/// Engine activity counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Total engine ticks.
    pub cycles: u64,
    /// Front-end requests latched.
    pub requests: u64,

    /// LOOKUP ticks stalled on an undrained write to the same word or line.
    pub hazard_stalls: u64,
    /// LOOKUP ticks stalled on a full write-through buffer.
    pub buffer_full_stalls: u64,
    /// Ticks spent in FILL_WAIT or WRITEBACK_WAIT.
    pub backend_wait_cycles: u64,

    /// Lines refilled from the back end.
    pub fills: u64,
    /// Dirty lines written back.
    pub writebacks: u64,
    /// Write-through entries acknowledged by the back end.
    pub drained_writes: u64,

    /// Global invalidations applied.
    pub invalidations: u64,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"stalls"`, `"backend"`, `"accesses"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "stalls", "backend", "accesses"];

impl CacheStats {
    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `counters` - Hit/miss counters of the control interface.
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, counters: &HitMissCounters, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let cyc = self.cycles.max(1) as f64;
        let pct = |n: u64| (n as f64 / cyc) * 100.0;

        println!("\n==========================================================");
        println!("CACHE SIMULATION STATISTICS");
        println!("==========================================================");
        if want("summary") {
            println!("sim_cycles               {}", self.cycles);
            println!("sim_requests             {}", self.requests);
            println!("invalidations            {}", self.invalidations);
            println!("----------------------------------------------------------");
        }
        if want("stalls") {
            println!("STALLS");
            println!(
                "  stalls.hazard          {} ({:.2}%)",
                self.hazard_stalls,
                pct(self.hazard_stalls)
            );
            println!(
                "  stalls.buffer_full     {} ({:.2}%)",
                self.buffer_full_stalls,
                pct(self.buffer_full_stalls)
            );
            println!(
                "  stalls.backend         {} ({:.2}%)",
                self.backend_wait_cycles,
                pct(self.backend_wait_cycles)
            );
            println!("----------------------------------------------------------");
        }
        if want("backend") {
            println!("BACK END");
            println!("  be.fills               {}", self.fills);
            println!("  be.writebacks          {}", self.writebacks);
            println!("  be.drained_writes      {}", self.drained_writes);
            println!("----------------------------------------------------------");
        }
        if want("accesses") {
            let print_kind = |name: &str, hits: u32, misses: u32| {
                let total = u64::from(hits) + u64::from(misses);
                let miss_rate = if total > 0 {
                    (f64::from(misses) / total as f64) * 100.0
                } else {
                    0.0
                };
                println!(
                    "  {:<6} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}%",
                    name, total, hits, miss_rate
                );
            };
            println!("ACCESSES");
            print_kind("read", counters.read_hit, counters.read_miss);
            print_kind("write", counters.write_hit, counters.write_miss);
            print_kind("total", counters.rw_hit(), counters.rw_miss());
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(counters, &[])`.
    pub fn print(&self, counters: &HitMissCounters) {
        self.print_sections(counters, &[]);
    }
}
