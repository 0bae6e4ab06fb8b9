//! Error definitions.
//!
//! This module defines the recoverable error types of the cache model:
//! 1. **Configuration errors:** parameter combinations the hardware cannot be generated with.
//! 2. **Driver errors:** a back end that does not acknowledge within the tick budget of the
//!    simulation driver, and I/O or JSON failures while loading configs and traces.
//!
//! A full write-through buffer is not an error: it is backpressure reported by
//! `WriteThroughBuffer::enqueue` returning `false`. Out-of-range set/way indices are
//! contract violations and panic.

use thiserror::Error;

/// Rejected cache parameter combinations, detected before anything is allocated.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Front-end data width is not 8, 16, 32 or 64 bits.
    #[error("front-end data width {0} is not one of 8, 16, 32, 64")]
    FrontEndDataWidth(u32),

    /// Back-end data width is narrower than, or not a power-of-two multiple of, the front end.
    #[error("back-end data width {be} must be a power-of-two multiple of front-end width {fe}")]
    BackEndDataWidth {
        /// Front-end data width.
        fe: u32,
        /// Back-end data width.
        be: u32,
    },

    /// Back-end data width exceeds the widest supported bus.
    #[error("back-end data width {0} exceeds 256 bits")]
    BackEndTooWide(u32),

    /// A line is narrower than one back-end beat.
    #[error("line of {line_bits} bits is narrower than one {be}-bit back-end beat")]
    LineNarrowerThanBeat {
        /// Line width in bits.
        line_bits: u64,
        /// Back-end data width.
        be: u32,
    },

    /// Front-end address width outside 1..=64.
    #[error("front-end address width {0} outside 1..=64")]
    AddressWidth(u32),

    /// Address too narrow for the configured set/word/byte fields.
    #[error(
        "front-end address width {addr_w} leaves no tag bits after {index_w} set/word/byte bits"
    )]
    AddressTooNarrow {
        /// Front-end address width.
        addr_w: u32,
        /// Set + word offset + byte offset widths.
        index_w: u32,
    },

    /// More ways than the replacement state supports.
    #[error("{0} way bits exceeds the maximum of 8")]
    TooManyWays(u32),

    /// Set index width out of range.
    #[error("{0} set-index bits exceeds the maximum of 24")]
    TooManySets(u32),

    /// Word offset width out of range.
    #[error("{0} word-offset bits exceeds the maximum of 16")]
    LineTooLong(u32),

    /// Write-through buffer depth out of range.
    #[error("write-through buffer depth of {0} bits exceeds the maximum of 16")]
    BufferDepth(u32),

    /// A cache used as the back end of another has a different word width.
    #[error("next-level cache word width {lower} differs from upper level word width {upper}")]
    LevelWidthMismatch {
        /// Front-end data width of the upper level.
        upper: u32,
        /// Front-end data width of the lower level.
        lower: u32,
    },
}

/// Errors surfaced by the cache model and its simulation driver.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid configuration; nothing was constructed.
    #[error("invalid cache configuration: {0}")]
    Config(#[from] ConfigError),

    /// The back end did not acknowledge within the driver's tick budget.
    #[error("request not acknowledged within {ticks} ticks")]
    Timeout {
        /// Ticks spent waiting.
        ticks: u64,
    },

    /// Malformed JSON configuration or trace.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Could not read a configuration or trace file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
