//! Bit-based Pseudo-LRU (PLRU-MRU) Replacement Policy.
//!
//! Each way has one "recently used" bit. An access sets the way's bit; when that
//! would leave every bit of the set at 1, the row wraps around to only the accessed
//! way's bit. The victim is the lowest-index way whose bit is 0.
//!
//! # Performance
//!
//! - **Time Complexity:**
//!   - `on_access()`: O(W)
//!   - `select_victim()`: O(W)
//! - **Space Complexity:** O(S × W) bits
//! - **Hardware Cost:** Low - one bit per way plus a priority encoder

use super::ReplacementPolicy;

/// PLRU-MRU Policy state.
#[derive(Clone, Debug)]
pub struct PlruMruPolicy {
    /// Flat per-set MRU bit rows.
    bits: Vec<bool>,
    /// Most recently set way of each set; needed to rebuild a saturated row.
    last: Vec<usize>,
    ways: usize,
}

impl PlruMruPolicy {
    /// Creates a new PLRU-MRU policy instance with every bit clear.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            bits: vec![false; sets * ways],
            last: vec![0; sets],
            ways,
        }
    }

    fn row_mut(&mut self, set: usize) -> &mut [bool] {
        &mut self.bits[set * self.ways..(set + 1) * self.ways]
    }

    /// Returns the MRU bit row of `set`, one entry per way.
    pub fn bits(&self, set: usize) -> &[bool] {
        &self.bits[set * self.ways..(set + 1) * self.ways]
    }

    /// Clears every bit of the row except `keep`.
    fn wrap(&mut self, set: usize, keep: usize) {
        for (w, bit) in self.row_mut(set).iter_mut().enumerate() {
            *bit = w == keep;
        }
    }
}

impl ReplacementPolicy for PlruMruPolicy {
    fn on_access(&mut self, set: usize, way: usize) {
        self.last[set] = way;
        let row = self.row_mut(set);
        row[way] = true;
        if row.iter().all(|&b| b) {
            self.wrap(set, way);
        }
    }

    fn select_victim(&mut self, set: usize) -> usize {
        if let Some(way) = self.bits(set).iter().position(|&b| !b) {
            return way;
        }
        // Saturated row: only reachable with a single way.
        let keep = self.last[set];
        self.wrap(set, keep);
        self.bits(set).iter().position(|&b| !b).unwrap_or(0)
    }

    fn reset(&mut self, set: usize) {
        self.row_mut(set).fill(false);
        self.last[set] = 0;
    }

    fn reset_all(&mut self) {
        self.bits.fill(false);
        self.last.fill(0);
    }
}
