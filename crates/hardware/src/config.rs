//! Configuration system for the cache model.
//!
//! This module defines the generation parameters of the cache. It provides:
//! 1. **Defaults:** The parameter values the hardware generator ships with.
//! 2. **Structures:** The cache geometry and the back-end latency model.
//! 3. **Enums:** Replacement policy, write policy and memory controller selectors.
//! 4. **Validation:** Rejection of parameter combinations that cannot be built.
//!
//! Configuration is supplied as JSON (CLI and tests) or built with `CacheConfig::default()`.
//! All parameters are fixed at construction; nothing here is consulted per request
//! except through the values the engine derives from it up front.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::addr::low_mask;
use crate::common::error::{CacheError, ConfigError};

/// Default configuration constants.
///
/// These match the generator's default parameter table: a 2-way, 128-set cache of
/// 8-word lines on a 24-bit, 32-bit-wide front end, with a 16-entry write-through
/// buffer.
mod defaults {
    /// Front-end byte address width.
    pub const FE_ADDR_W: u32 = 24;

    /// Front-end data width in bits.
    pub const FE_DATA_W: u32 = 32;

    /// Back-end data width in bits.
    pub const BE_DATA_W: u32 = 32;

    /// log2 of the number of ways.
    pub const NWAYS_W: u32 = 1;

    /// log2 of the number of sets.
    pub const NLINES_W: u32 = 7;

    /// log2 of the number of words per line.
    pub const WORD_OFFSET_W: u32 = 3;

    /// log2 of the write-through buffer depth.
    pub const WTBUF_DEPTH_W: u32 = 4;

    /// Hit/miss counters in the control block.
    pub const USE_CTRL_CNT: bool = true;

    /// Fixed back-end access latency in cycles.
    pub const BE_LATENCY: u64 = 4;

    /// CAS (Column Access Strobe) latency in DRAM cycles.
    pub const T_CAS: u64 = 14;

    /// RAS (Row Access Strobe) latency in DRAM cycles.
    pub const T_RAS: u64 = 14;

    /// Precharge latency in DRAM cycles.
    pub const T_PRE: u64 = 14;

    /// log2 of the DRAM row size (2 KiB).
    pub const ROW_BYTES_W: u32 = 11;
}

/// Upper bounds accepted by [`CacheConfig::validate`].
mod limits {
    /// Widest supported back-end bus.
    pub const MAX_BE_DATA_W: u32 = 256;
    /// Most way bits (256 ways).
    pub const MAX_NWAYS_W: u32 = 8;
    /// Most set-index bits.
    pub const MAX_NLINES_W: u32 = 24;
    /// Most word-offset bits.
    pub const MAX_WORD_OFFSET_W: u32 = 16;
    /// Most write-through buffer depth bits.
    pub const MAX_WTBUF_DEPTH_W: u32 = 16;
}

/// Cache replacement policy algorithms.
///
/// Selects how a victim way is chosen when a miss must install a line into a
/// full set. Chosen at construction and never re-checked per access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ReplacementPolicy {
    /// Least Recently Used, one `nways_w`-bit counter per way.
    #[default]
    #[serde(alias = "LRU", alias = "lru")]
    Lru,
    /// Bit-based pseudo-LRU: one most-recently-used bit per way.
    #[serde(alias = "PLRU_MRU", alias = "plru_mru")]
    PlruMru,
    /// Tree-based pseudo-LRU: `ways - 1` decision bits per set.
    #[serde(alias = "PLRU_TREE", alias = "plru_tree")]
    PlruTree,
}

/// Write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WritePolicy {
    /// Write-through, no write-allocate. Writes are queued in the write-through buffer.
    #[default]
    #[serde(alias = "WRITE_THROUGH", alias = "write_through")]
    WriteThrough,
    /// Write-back, write-allocate. Writes mark the line dirty; dirty victims are
    /// written back before the refill.
    #[serde(alias = "WRITE_BACK", alias = "write_back")]
    WriteBack,
}

/// Back-end memory controller timing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryController {
    /// Fixed latency per transaction.
    #[default]
    Simple,
    /// DRAM controller with row buffer modeling (CAS, RAS, precharge).
    #[serde(alias = "DRAM")]
    Dram,
}

/// Latency model of the reference back end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackEndConfig {
    /// Memory controller type
    #[serde(default)]
    pub controller: MemoryController,

    /// Fixed access latency (Simple controller)
    #[serde(default = "BackEndConfig::default_latency")]
    pub latency: u64,

    /// CAS latency (column access strobe)
    #[serde(default = "BackEndConfig::default_t_cas")]
    pub t_cas: u64,

    /// RAS latency (row access strobe)
    #[serde(default = "BackEndConfig::default_t_ras")]
    pub t_ras: u64,

    /// Precharge latency
    #[serde(default = "BackEndConfig::default_t_pre")]
    pub t_pre: u64,

    /// log2 of the DRAM row size in bytes
    #[serde(default = "BackEndConfig::default_row_bytes_w")]
    pub row_bytes_w: u32,
}

impl BackEndConfig {
    /// Returns the default fixed latency in cycles.
    fn default_latency() -> u64 {
        defaults::BE_LATENCY
    }

    /// Returns the default CAS latency in DRAM cycles.
    fn default_t_cas() -> u64 {
        defaults::T_CAS
    }

    /// Returns the default RAS latency in DRAM cycles.
    fn default_t_ras() -> u64 {
        defaults::T_RAS
    }

    /// Returns the default precharge latency in DRAM cycles.
    fn default_t_pre() -> u64 {
        defaults::T_PRE
    }

    fn default_row_bytes_w() -> u32 {
        defaults::ROW_BYTES_W
    }
}

impl Default for BackEndConfig {
    fn default() -> Self {
        Self {
            controller: MemoryController::default(),
            latency: defaults::BE_LATENCY,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
            row_bytes_w: defaults::ROW_BYTES_W,
        }
    }
}

/// Cache generation parameters.
///
/// # Examples
///
/// ```
/// use cachesim_core::config::{CacheConfig, ReplacementPolicy, WritePolicy};
///
/// let config = CacheConfig::default();
/// assert_eq!(config.ways(), 2);
/// assert_eq!(config.sets(), 128);
/// assert_eq!(config.rep_policy, ReplacementPolicy::Lru);
/// assert_eq!(config.write_pol, WritePolicy::WriteThrough);
/// assert!(config.validate().is_ok());
/// ```
///
/// Deserializing from JSON; omitted fields take their defaults:
///
/// ```
/// use cachesim_core::config::{CacheConfig, ReplacementPolicy, WritePolicy};
///
/// let json = r#"{
///     "nways_w": 2,
///     "nlines_w": 4,
///     "rep_policy": "PLRU_TREE",
///     "write_pol": "WriteBack",
///     "be_data_w": 64
/// }"#;
///
/// let config = CacheConfig::from_json(json).unwrap();
/// assert_eq!(config.ways(), 4);
/// assert_eq!(config.rep_policy, ReplacementPolicy::PlruTree);
/// assert_eq!(config.write_pol, WritePolicy::WriteBack);
/// assert_eq!(config.beats_per_line(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Front-end byte address width
    #[serde(default = "CacheConfig::default_fe_addr_w")]
    pub fe_addr_w: u32,

    /// Front-end data width in bits
    #[serde(default = "CacheConfig::default_fe_data_w")]
    pub fe_data_w: u32,

    /// Back-end data width in bits
    #[serde(default = "CacheConfig::default_be_data_w")]
    pub be_data_w: u32,

    /// Number of ways (log2); 0 is direct-mapped
    #[serde(default = "CacheConfig::default_nways_w")]
    pub nways_w: u32,

    /// Number of sets (log2)
    #[serde(default = "CacheConfig::default_nlines_w")]
    pub nlines_w: u32,

    /// Words per line (log2)
    #[serde(default = "CacheConfig::default_word_offset_w")]
    pub word_offset_w: u32,

    /// Write-through buffer depth (log2)
    #[serde(default = "CacheConfig::default_wtbuf_depth_w")]
    pub wtbuf_depth_w: u32,

    /// Replacement policy
    #[serde(default)]
    pub rep_policy: ReplacementPolicy,

    /// Write policy
    #[serde(default)]
    pub write_pol: WritePolicy,

    /// Reference back-end latency model
    #[serde(default)]
    pub back_end: BackEndConfig,

    /// Build the control block with hit/miss counters
    #[serde(default = "CacheConfig::default_use_ctrl_cnt")]
    pub use_ctrl_cnt: bool,
}

impl CacheConfig {
    fn default_fe_addr_w() -> u32 {
        defaults::FE_ADDR_W
    }

    fn default_fe_data_w() -> u32 {
        defaults::FE_DATA_W
    }

    fn default_be_data_w() -> u32 {
        defaults::BE_DATA_W
    }

    fn default_nways_w() -> u32 {
        defaults::NWAYS_W
    }

    fn default_nlines_w() -> u32 {
        defaults::NLINES_W
    }

    fn default_word_offset_w() -> u32 {
        defaults::WORD_OFFSET_W
    }

    fn default_wtbuf_depth_w() -> u32 {
        defaults::WTBUF_DEPTH_W
    }

    fn default_use_ctrl_cnt() -> bool {
        defaults::USE_CTRL_CNT
    }

    /// Parses a configuration from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Json` for malformed input and `CacheError::Config` for
    /// parameter combinations rejected by [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks that the parameters describe a buildable cache.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.fe_data_w, 8 | 16 | 32 | 64) {
            return Err(ConfigError::FrontEndDataWidth(self.fe_data_w));
        }
        if self.be_data_w > limits::MAX_BE_DATA_W {
            return Err(ConfigError::BackEndTooWide(self.be_data_w));
        }
        if self.be_data_w < self.fe_data_w
            || self.be_data_w % self.fe_data_w != 0
            || !(self.be_data_w / self.fe_data_w).is_power_of_two()
        {
            return Err(ConfigError::BackEndDataWidth {
                fe: self.fe_data_w,
                be: self.be_data_w,
            });
        }
        if self.nways_w > limits::MAX_NWAYS_W {
            return Err(ConfigError::TooManyWays(self.nways_w));
        }
        if self.nlines_w > limits::MAX_NLINES_W {
            return Err(ConfigError::TooManySets(self.nlines_w));
        }
        if self.word_offset_w > limits::MAX_WORD_OFFSET_W {
            return Err(ConfigError::LineTooLong(self.word_offset_w));
        }
        if self.wtbuf_depth_w > limits::MAX_WTBUF_DEPTH_W {
            return Err(ConfigError::BufferDepth(self.wtbuf_depth_w));
        }
        let line_bits = self.line_bits();
        if line_bits < u64::from(self.be_data_w) {
            return Err(ConfigError::LineNarrowerThanBeat {
                line_bits,
                be: self.be_data_w,
            });
        }
        if self.fe_addr_w == 0 || self.fe_addr_w > u64::BITS {
            return Err(ConfigError::AddressWidth(self.fe_addr_w));
        }
        let index_w = self.nlines_w + self.word_offset_w + self.fe_nbytes_w();
        if self.fe_addr_w <= index_w {
            return Err(ConfigError::AddressTooNarrow {
                addr_w: self.fe_addr_w,
                index_w,
            });
        }
        Ok(())
    }

    /// Bytes per front-end word.
    #[inline]
    pub const fn fe_nbytes(&self) -> u32 {
        self.fe_data_w / 8
    }

    /// Byte-offset width of a front-end word.
    #[inline]
    pub const fn fe_nbytes_w(&self) -> u32 {
        self.fe_nbytes().trailing_zeros()
    }

    /// Mask covering one front-end word.
    #[inline]
    pub const fn word_mask(&self) -> u64 {
        low_mask(self.fe_data_w)
    }

    /// Number of ways.
    #[inline]
    pub const fn ways(&self) -> usize {
        1 << self.nways_w
    }

    /// Number of sets.
    #[inline]
    pub const fn sets(&self) -> usize {
        1 << self.nlines_w
    }

    /// Number of words per line.
    #[inline]
    pub const fn words_per_line(&self) -> usize {
        1 << self.word_offset_w
    }

    /// Line width in bits.
    #[inline]
    pub const fn line_bits(&self) -> u64 {
        (self.fe_data_w as u64) << self.word_offset_w
    }

    /// Number of back-end beats needed to move one line.
    #[inline]
    pub const fn beats_per_line(&self) -> u64 {
        self.line_bits() / self.be_data_w as u64
    }

    /// Write-through buffer capacity.
    #[inline]
    pub const fn wtb_capacity(&self) -> usize {
        1 << self.wtbuf_depth_w
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fe_addr_w: defaults::FE_ADDR_W,
            fe_data_w: defaults::FE_DATA_W,
            be_data_w: defaults::BE_DATA_W,
            nways_w: defaults::NWAYS_W,
            nlines_w: defaults::NLINES_W,
            word_offset_w: defaults::WORD_OFFSET_W,
            wtbuf_depth_w: defaults::WTBUF_DEPTH_W,
            rep_policy: ReplacementPolicy::default(),
            write_pol: WritePolicy::default(),
            back_end: BackEndConfig::default(),
            use_ctrl_cnt: defaults::USE_CTRL_CNT,
        }
    }
}
