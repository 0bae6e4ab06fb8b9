//! Common types shared by every component of the cache model.
//!
//! This module provides:
//! 1. **Address slicing:** tag / set / word / byte field extraction.
//! 2. **Transactions:** front-end requests, responses and byte-strobe merging.
//! 3. **Error handling:** configuration and driver error types.

/// Address layout and field extraction.
pub mod addr;

/// Front-end request/response types.
pub mod data;

/// Error types.
pub mod error;

pub use addr::{AddressLayout, DecodedAddr};
pub use data::{AccessKind, AccessOutcome, Request, Response, merge_strobe};
pub use error::{CacheError, ConfigError};
