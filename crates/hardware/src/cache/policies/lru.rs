//! Least Recently Used (LRU) Replacement Policy.
//!
//! Each way of a set owns a counter in `0..ways`. The counters of a set always form
//! an order over the ways that have been touched: the most recently used way holds
//! `ways - 1` and the least recently used holds 0.
//!
//! On access, the touched way's counter jumps to the maximum and every counter that
//! was above its previous value moves down by one. Counters below it are untouched,
//! so the relative order of the other ways is preserved.
//!
//! # Performance
//!
//! - **Time Complexity:**
//!   - `on_access()`: O(W) where W is the number of ways (associativity)
//!   - `select_victim()`: O(W)
//! - **Space Complexity:** O(S × W) counters of `log2(W)` bits
//! - **Hardware Cost:** High - one comparator and decrementer per way

use super::ReplacementPolicy;

/// LRU Policy state.
#[derive(Clone, Debug)]
pub struct LruPolicy {
    /// Flat per-set counter rows.
    counters: Vec<u8>,
    ways: usize,
}

impl LruPolicy {
    /// Creates a new LRU policy instance with every counter at zero.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache, at most 256.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            counters: vec![0; sets * ways],
            ways,
        }
    }

    fn row(&self, set: usize) -> &[u8] {
        &self.counters[set * self.ways..(set + 1) * self.ways]
    }

    fn row_mut(&mut self, set: usize) -> &mut [u8] {
        &mut self.counters[set * self.ways..(set + 1) * self.ways]
    }

    /// Returns the counter row of `set`, one entry per way.
    pub fn counters(&self, set: usize) -> &[u8] {
        self.row(set)
    }
}

impl ReplacementPolicy for LruPolicy {
    fn on_access(&mut self, set: usize, way: usize) {
        let max = (self.ways - 1) as u8;
        let row = self.row_mut(set);
        let prev = row[way];
        for (w, counter) in row.iter_mut().enumerate() {
            if w == way {
                *counter = max;
            } else if *counter > prev {
                *counter -= 1;
            }
        }
    }

    /// Picks the lowest-index way whose counter is zero.
    fn select_victim(&mut self, set: usize) -> usize {
        self.row(set).iter().position(|&c| c == 0).unwrap_or(0)
    }

    fn reset(&mut self, set: usize) {
        self.row_mut(set).fill(0);
    }

    fn reset_all(&mut self) {
        self.counters.fill(0);
    }
}
