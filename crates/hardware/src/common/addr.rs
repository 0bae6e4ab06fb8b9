//! Front-end address slicing.
//!
//! A front-end byte address is split, from least to most significant bit, into:
//! 1. **Byte offset:** selects a byte inside a front-end word (`log2(fe_data_w / 8)` bits).
//! 2. **Word offset:** selects a word inside a line (`word_offset_w` bits).
//! 3. **Set index:** selects the set (`nlines_w` bits).
//! 4. **Tag:** the remaining bits up to the front-end address width.

use crate::config::CacheConfig;

/// Returns a mask with the low `bits` bits set.
#[inline]
pub const fn low_mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// An address broken into its cache fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedAddr {
    /// Tag bits, right-aligned.
    pub tag: u64,
    /// Set index.
    pub set: usize,
    /// Word index inside the line.
    pub word: usize,
    /// Byte index inside the word.
    pub byte: usize,
}

/// Field widths used to slice front-end addresses.
///
/// The layout is derived once from a validated [`CacheConfig`] and shared by the
/// engine, the write-through buffer hazard check and the back-end model so that
/// every component agrees on what a "line address" and a "word address" are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressLayout {
    addr_w: u32,
    byte_offset_w: u32,
    word_offset_w: u32,
    set_w: u32,
}

impl AddressLayout {
    /// Creates a layout from raw field widths.
    ///
    /// # Arguments
    ///
    /// * `addr_w` - Front-end address width in bits.
    /// * `byte_offset_w` - Bits selecting a byte inside a word.
    /// * `word_offset_w` - Bits selecting a word inside a line.
    /// * `set_w` - Bits selecting a set.
    pub const fn new(addr_w: u32, byte_offset_w: u32, word_offset_w: u32, set_w: u32) -> Self {
        Self {
            addr_w,
            byte_offset_w,
            word_offset_w,
            set_w,
        }
    }

    /// Derives the layout from a cache configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.fe_addr_w,
            config.fe_nbytes_w(),
            config.word_offset_w,
            config.nlines_w,
        )
    }

    /// Truncates an address to the front-end address width.
    #[inline]
    pub const fn mask(&self, addr: u64) -> u64 {
        addr & low_mask(self.addr_w)
    }

    /// Splits an address into tag, set, word and byte fields.
    pub const fn decode(&self, addr: u64) -> DecodedAddr {
        let addr = self.mask(addr);
        let byte = addr & low_mask(self.byte_offset_w);
        let word = (addr >> self.byte_offset_w) & low_mask(self.word_offset_w);
        let set = (addr >> self.line_offset_w()) & low_mask(self.set_w);
        let tag = match addr.checked_shr(self.index_w()) {
            Some(v) => v,
            None => 0,
        };
        DecodedAddr {
            tag,
            set: set as usize,
            word: word as usize,
            byte: byte as usize,
        }
    }

    /// Rebuilds the byte address of the first byte of a line.
    pub const fn line_base(&self, tag: u64, set: usize) -> u64 {
        let tag_part = match tag.checked_shl(self.index_w()) {
            Some(v) => v,
            None => 0,
        };
        self.mask(tag_part | ((set as u64) << self.line_offset_w()))
    }

    /// Clears the word and byte offset of an address.
    #[inline]
    pub const fn line_addr(&self, addr: u64) -> u64 {
        self.mask(addr) & !low_mask(self.line_offset_w())
    }

    /// Clears the byte offset of an address.
    #[inline]
    pub const fn word_addr(&self, addr: u64) -> u64 {
        self.mask(addr) & !low_mask(self.byte_offset_w)
    }

    /// Bits below the set index (word + byte offset).
    #[inline]
    pub const fn line_offset_w(&self) -> u32 {
        self.byte_offset_w + self.word_offset_w
    }

    /// Bits below the tag (set + word + byte offset).
    #[inline]
    pub const fn index_w(&self) -> u32 {
        self.line_offset_w() + self.set_w
    }

    /// Width of the tag field.
    #[inline]
    pub const fn tag_w(&self) -> u32 {
        self.addr_w.saturating_sub(self.index_w())
    }

    /// Front-end address width.
    #[inline]
    pub const fn addr_w(&self) -> u32 {
        self.addr_w
    }

    /// Number of sets.
    #[inline]
    pub const fn sets(&self) -> usize {
        1 << self.set_w
    }

    /// Number of words in a line.
    #[inline]
    pub const fn words_per_line(&self) -> usize {
        1 << self.word_offset_w
    }

    /// Number of bytes in a front-end word.
    #[inline]
    pub const fn bytes_per_word(&self) -> usize {
        1 << self.byte_offset_w
    }

    /// Number of bytes in a line.
    #[inline]
    pub const fn bytes_per_line(&self) -> usize {
        1 << self.line_offset_w()
    }
}
