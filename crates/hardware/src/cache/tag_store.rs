//! Tag memory.
//!
//! One [`TagEntry`] per (set, way), stored flat in set-major order. Entries are only
//! mutated by the engine: on install, on write hits (dirty bit, write-back only) and on
//! global invalidation.

/// Tag memory entry containing tag, validity, and dirty bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagEntry {
    /// Tag bits of the resident line.
    pub tag: u64,
    /// Line holds live data.
    pub valid: bool,
    /// Line was written since it was installed (write-back only).
    pub dirty: bool,
}

/// Per-set, per-way tag/valid/dirty metadata.
#[derive(Clone, Debug)]
pub struct TagStore {
    entries: Vec<TagEntry>,
    sets: usize,
    ways: usize,
}

impl TagStore {
    /// Creates a tag store with every entry invalid.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            entries: vec![TagEntry::default(); sets * ways],
            sets,
            ways,
        }
    }

    /// Number of sets.
    #[inline]
    pub const fn sets(&self) -> usize {
        self.sets
    }

    /// Number of ways.
    #[inline]
    pub const fn ways(&self) -> usize {
        self.ways
    }

    /// Flat index of (set, way).
    ///
    /// # Panics
    ///
    /// Panics if `set` or `way` is out of range.
    #[inline]
    fn index(&self, set: usize, way: usize) -> usize {
        assert!(
            set < self.sets && way < self.ways,
            "tag store access out of range: set {set}, way {way}"
        );
        set * self.ways + way
    }

    /// Returns the way holding a valid line with `tag` in `set`, if any.
    pub fn lookup(&self, set: usize, tag: u64) -> Option<usize> {
        let base = self.index(set, 0);
        self.entries[base..base + self.ways]
            .iter()
            .position(|e| e.valid && e.tag == tag)
    }

    /// Installs `tag` in (set, way): valid, clean, previous occupant discarded.
    ///
    /// The caller must already have written back a dirty occupant.
    pub fn install(&mut self, set: usize, way: usize, tag: u64) {
        debug_assert!(
            self.lookup(set, tag).is_none_or(|w| w == way),
            "tag {tag:#x} already resident in set {set}"
        );
        let idx = self.index(set, way);
        self.entries[idx] = TagEntry {
            tag,
            valid: true,
            dirty: false,
        };
    }

    /// Clears every valid and dirty bit.
    pub fn invalidate_all(&mut self) {
        for entry in &mut self.entries {
            entry.valid = false;
            entry.dirty = false;
        }
    }

    /// Marks (set, way) dirty.
    pub fn mark_dirty(&mut self, set: usize, way: usize) {
        let idx = self.index(set, way);
        self.entries[idx].dirty = true;
    }

    /// Marks (set, way) clean.
    pub fn clear_dirty(&mut self, set: usize, way: usize) {
        let idx = self.index(set, way);
        self.entries[idx].dirty = false;
    }

    /// Returns the entry at (set, way).
    pub fn entry(&self, set: usize, way: usize) -> &TagEntry {
        &self.entries[self.index(set, way)]
    }

    /// Number of valid entries across the whole store.
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }
}
