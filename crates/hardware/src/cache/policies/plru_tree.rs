//! Tree-based Pseudo-LRU (PLRU-Tree) Replacement Policy.
//!
//! PLRU approximates the Least Recently Used algorithm using a binary tree of bits.
//! It requires significantly less storage than full LRU (N-1 bits for N ways).
//!
//! Each bit in the tree is a decision node: `false` points at the left subtree,
//! `true` at the right one. An access flips every node on the path to the way so
//! that it points away from it. To find a victim, the tree is traversed from the
//! root following the bits to a leaf.
//!
//! Nodes are stored in heap order: node `n` has children `2n + 1` and `2n + 2`.
//!
//! # Performance
//!
//! - **Time Complexity:**
//!   - `on_access()`: O(log W)
//!   - `select_victim()`: O(log W)
//! - **Space Complexity:** O(S × W) bits where S is sets, W is ways
//! - **Hardware Cost:** Low - simple bit operations
//! - **Worst Case:** Pathological cases can cause premature eviction of useful lines

use super::ReplacementPolicy;

/// PLRU-Tree Policy state.
#[derive(Clone, Debug)]
pub struct PlruTreePolicy {
    /// Flat per-set trees of `ways - 1` nodes.
    nodes: Vec<bool>,
    /// Nodes per set.
    stride: usize,
    /// Tree depth, `log2(ways)`.
    levels: u32,
}

impl PlruTreePolicy {
    /// Creates a new PLRU-Tree policy instance with every node pointing left.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity; must be a power of two.
    pub fn new(sets: usize, ways: usize) -> Self {
        debug_assert!(ways.is_power_of_two(), "tree PLRU needs power-of-two ways");
        let stride = ways - 1;
        Self {
            nodes: vec![false; sets * stride],
            stride,
            levels: ways.trailing_zeros(),
        }
    }

    /// Returns the node bits of `set` in heap order.
    pub fn tree(&self, set: usize) -> &[bool] {
        &self.nodes[set * self.stride..(set + 1) * self.stride]
    }

    fn tree_mut(&mut self, set: usize) -> &mut [bool] {
        &mut self.nodes[set * self.stride..(set + 1) * self.stride]
    }
}

impl ReplacementPolicy for PlruTreePolicy {
    fn on_access(&mut self, set: usize, way: usize) {
        let levels = self.levels;
        let tree = self.tree_mut(set);
        let mut node = 0;
        for level in (0..levels).rev() {
            let right = (way >> level) & 1;
            tree[node] = right == 0;
            node = 2 * node + 1 + right;
        }
    }

    fn select_victim(&mut self, set: usize) -> usize {
        let tree = self.tree(set);
        let mut node = 0;
        let mut way = 0;
        for _ in 0..self.levels {
            let right = usize::from(tree[node]);
            way = (way << 1) | right;
            node = 2 * node + 1 + right;
        }
        way
    }

    fn reset(&mut self, set: usize) {
        self.tree_mut(set).fill(false);
    }

    fn reset_all(&mut self) {
        self.nodes.fill(false);
    }
}
