//! Data memory: one line of front-end words per (set, way).

use crate::common::data::merge_strobe;

/// Per-set, per-way line storage.
#[derive(Clone, Debug)]
pub struct DataStore {
    words: Vec<u64>,
    ways: usize,
    words_per_line: usize,
    word_mask: u64,
}

impl DataStore {
    /// Creates a zero-filled data store.
    ///
    /// # Arguments
    ///
    /// * `sets` - Number of sets.
    /// * `ways` - Number of ways.
    /// * `words_per_line` - Front-end words per line.
    /// * `word_mask` - Mask of the front-end data width; stored words are truncated to it.
    pub fn new(sets: usize, ways: usize, words_per_line: usize, word_mask: u64) -> Self {
        Self {
            words: vec![0; sets * ways * words_per_line],
            ways,
            words_per_line,
            word_mask,
        }
    }

    #[inline]
    fn line_start(&self, set: usize, way: usize) -> usize {
        assert!(way < self.ways, "data store way {way} out of range");
        (set * self.ways + way) * self.words_per_line
    }

    /// Reads one word of a line.
    pub fn read_word(&self, set: usize, way: usize, word: usize) -> u64 {
        self.line(set, way)[word]
    }

    /// Merges a byte-strobed write into one word of a line.
    pub fn write_word(&mut self, set: usize, way: usize, word: usize, data: u64, wstrb: u8) {
        let start = self.line_start(set, way);
        let slot = &mut self.words[start..start + self.words_per_line][word];
        *slot = merge_strobe(*slot, data, wstrb) & self.word_mask;
    }

    /// Returns the words of a line.
    pub fn line(&self, set: usize, way: usize) -> &[u64] {
        let start = self.line_start(set, way);
        &self.words[start..start + self.words_per_line]
    }

    /// Replaces a whole line with data returned by the back end.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not exactly one line long.
    pub fn fill_line(&mut self, set: usize, way: usize, data: &[u64]) {
        assert_eq!(
            data.len(),
            self.words_per_line,
            "fill data must cover exactly one line"
        );
        let start = self.line_start(set, way);
        let mask = self.word_mask;
        for (dst, src) in self.words[start..start + self.words_per_line]
            .iter_mut()
            .zip(data)
        {
            *dst = src & mask;
        }
    }
}
