//! Cache Replacement Policies.
//!
//! Implements the victim-selection algorithms the cache can be generated with.
//!
//! # Policies
//!
//! - `Lru`: Least Recently Used, order-preserving per-way counters.
//! - `PlruMru`: Pseudo-LRU with one most-recently-used bit per way.
//! - `PlruTree`: Pseudo-LRU with a binary decision tree per set.
//!
//! The tie-break and wraparound rules of each policy are observable through the
//! order in which ways are evicted and are part of the contract.

use std::fmt;

use crate::config::ReplacementPolicy as PolicyType;

/// Least Recently Used replacement policy.
pub mod lru;

/// Bit-based pseudo-LRU replacement policy.
pub mod plru_mru;

/// Tree-based pseudo-LRU replacement policy.
pub mod plru_tree;

pub use lru::LruPolicy;
pub use plru_mru::PlruMruPolicy;
pub use plru_tree::PlruTreePolicy;

/// Trait for cache replacement policies.
///
/// Defines the interface for updating usage state and selecting victim lines.
pub trait ReplacementPolicy: Send + Sync + fmt::Debug {
    /// Records that `way` in `set` was just referenced (hit or fill).
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `way` - The way index within the set that was accessed.
    fn on_access(&mut self, set: usize, way: usize);

    /// Selects the way to evict from `set`.
    ///
    /// Takes `&mut self` because a policy may normalise its state for the set
    /// before choosing.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    ///
    /// # Returns
    ///
    /// The index of the way to evict.
    fn select_victim(&mut self, set: usize) -> usize;

    /// Returns the state of `set` to its power-on value.
    fn reset(&mut self, set: usize);

    /// Returns every set to its power-on value.
    fn reset_all(&mut self);
}

/// Builds the policy selected by the configuration.
///
/// This is the only place the policy selector is examined.
pub fn build(kind: PolicyType, sets: usize, ways: usize) -> Box<dyn ReplacementPolicy> {
    match kind {
        PolicyType::Lru => Box::new(LruPolicy::new(sets, ways)),
        PolicyType::PlruMru => Box::new(PlruMruPolicy::new(sets, ways)),
        PolicyType::PlruTree => Box::new(PlruTreePolicy::new(sets, ways)),
    }
}
