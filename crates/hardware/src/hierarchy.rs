//! Multi-level chaining.
//!
//! Caches stack by putting a [`NextLevel`] adapter behind the upper level: the
//! adapter is the upper level's back end and drives the lower cache's front end.
//! Two control signals run through the stack:
//! 1. **Invalidate:** an invalidate presented to the top level is forwarded to the
//!    level below once the level above has applied it.
//! 2. **Write-buffer empty:** each level reports its own buffer state ANDed with
//!    the report of the level below, so the top reports empty only when every
//!    write-through write in the stack has reached memory.
//!
//! There is no global state; [`propagate_invalidate`] and [`write_buffer_empty`] walk
//! the levels through [`HierarchyLevel::next_level`].

use std::collections::VecDeque;
use std::mem;

use crate::backend::{BackEnd, BackEndRequest, BackEndResponse};
use crate::cache::CacheEngine;
use crate::common::data::Request;
use crate::common::error::ConfigError;
use crate::config::CacheConfig;
use crate::control::CacheController;

/// One cache in a stack.
pub trait HierarchyLevel {
    /// Presents `invalidate_i`; see [`CacheEngine::invalidate`].
    ///
    /// # Returns
    ///
    /// True if the invalidate was applied by this call.
    fn invalidate(&mut self, invalidate_i: bool) -> bool;

    /// Returns and clears this level's invalidate-done pulse.
    fn take_invalidate_out(&mut self) -> bool;

    /// This level's own write-buffer-empty status.
    fn write_buffer_empty(&self) -> bool;

    /// The level below, if its back end is another cache.
    fn next_level(&mut self) -> Option<&mut dyn HierarchyLevel>;

    /// Shared view of [`next_level`](Self::next_level).
    fn next_level_ref(&self) -> Option<&dyn HierarchyLevel>;
}

impl<B: BackEnd> HierarchyLevel for CacheEngine<B> {
    fn invalidate(&mut self, invalidate_i: bool) -> bool {
        Self::invalidate(self, invalidate_i)
    }

    fn take_invalidate_out(&mut self) -> bool {
        Self::take_invalidate_out(self)
    }

    fn write_buffer_empty(&self) -> bool {
        Self::write_buffer_empty(self)
    }

    fn next_level(&mut self) -> Option<&mut dyn HierarchyLevel> {
        self.back_end_mut().next_level()
    }

    fn next_level_ref(&self) -> Option<&dyn HierarchyLevel> {
        self.back_end().next_level_ref()
    }
}

impl<B: BackEnd> HierarchyLevel for CacheController<B> {
    fn invalidate(&mut self, invalidate_i: bool) -> bool {
        Self::invalidate(self, invalidate_i)
    }

    fn take_invalidate_out(&mut self) -> bool {
        Self::take_invalidate_out(self)
    }

    fn write_buffer_empty(&self) -> bool {
        Self::write_buffer_empty(self)
    }

    fn next_level(&mut self) -> Option<&mut dyn HierarchyLevel> {
        self.engine_mut().back_end_mut().next_level()
    }

    fn next_level_ref(&self) -> Option<&dyn HierarchyLevel> {
        self.engine().back_end().next_level_ref()
    }
}

/// Drives the invalidate chain for one tick.
///
/// `invalidate_i` is presented to `top`. Every level that raises its
/// invalidate-done pulse passes it to the level below on the same call; a level
/// that has to defer (fill or writeback outstanding) keeps it latched and raises
/// the pulse on a later tick. Call once per tick with `false` to keep deferred
/// invalidates moving.
///
/// # Returns
///
/// The invalidate-done pulse of the bottom level.
pub fn propagate_invalidate(top: &mut dyn HierarchyLevel, invalidate_i: bool) -> bool {
    let mut level = Some(top);
    let mut signal = invalidate_i;
    while let Some(current) = level {
        let _ = current.invalidate(signal);
        signal = current.take_invalidate_out();
        level = current.next_level();
    }
    signal
}

/// Write-buffer-empty status of a whole stack: `own_empty && below_empty` at
/// every level.
pub fn write_buffer_empty(top: &dyn HierarchyLevel) -> bool {
    top.write_buffer_empty() && top.next_level_ref().is_none_or(write_buffer_empty)
}

/// Number of levels from `top` down.
pub fn depth(top: &dyn HierarchyLevel) -> usize {
    1 + top.next_level_ref().map_or(0, depth)
}

/// Back-end adapter that puts a lower cache behind an upper one.
///
/// Line transfers are split into one lower-level front-end request per word and
/// issued in address order; the lower cache is ticked once per poll. Both levels
/// must use the same word width.
#[derive(Debug)]
pub struct NextLevel<B: BackEnd> {
    cache: CacheController<B>,
    bytes_per_word: u64,
    ops: VecDeque<Request>,
    line: Vec<u64>,
    reading: bool,
}

impl<B: BackEnd> NextLevel<B> {
    /// Wraps `cache` as the back end of a cache configured by `upper`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LevelWidthMismatch` if the two levels use different
    /// front-end data widths.
    pub fn new(cache: CacheController<B>, upper: &CacheConfig) -> Result<Self, ConfigError> {
        let lower = cache.engine().config();
        if lower.fe_data_w != upper.fe_data_w {
            return Err(ConfigError::LevelWidthMismatch {
                upper: upper.fe_data_w,
                lower: lower.fe_data_w,
            });
        }
        Ok(Self {
            bytes_per_word: u64::from(lower.fe_nbytes()),
            cache,
            ops: VecDeque::new(),
            line: Vec::new(),
            reading: false,
        })
    }

    /// The lower cache.
    pub const fn cache(&self) -> &CacheController<B> {
        &self.cache
    }

    /// The lower cache, mutably.
    pub const fn cache_mut(&mut self) -> &mut CacheController<B> {
        &mut self.cache
    }
}

impl<B: BackEnd> BackEnd for NextLevel<B> {
    fn request(&mut self, req: BackEndRequest) {
        debug_assert!(self.ops.is_empty(), "next level accepts one transaction");
        let step = self.bytes_per_word;
        match req {
            BackEndRequest::ReadLine { addr, words } => {
                self.reading = true;
                self.line.clear();
                self.ops
                    .extend((0..words as u64).map(|i| Request::read(addr + i * step)));
            }
            BackEndRequest::WriteWord { addr, data, wstrb } => {
                self.reading = false;
                self.ops.push_back(Request::write(addr, data, wstrb));
            }
            BackEndRequest::WriteLine { addr, data } => {
                self.reading = false;
                self.ops.extend(
                    data.into_iter()
                        .zip(0u64..)
                        .map(|(word, i)| Request::write_word(addr + i * step, word)),
                );
            }
        }
    }

    fn poll(&mut self) -> Option<BackEndResponse> {
        let Some(op) = self.ops.front().copied() else {
            // Keep the lower level draining while the upper level is quiet.
            let _ = self.cache.tick(None);
            return None;
        };
        let resp = self.cache.tick(Some(&op))?;
        let _ = self.ops.pop_front();
        if self.reading {
            self.line.push(resp.rdata);
        }
        if !self.ops.is_empty() {
            return None;
        }
        if mem::take(&mut self.reading) {
            Some(BackEndResponse::ReadAck(mem::take(&mut self.line)))
        } else {
            Some(BackEndResponse::WriteAck)
        }
    }

    fn next_level(&mut self) -> Option<&mut dyn HierarchyLevel> {
        Some(&mut self.cache)
    }

    fn next_level_ref(&self) -> Option<&dyn HierarchyLevel> {
        Some(&self.cache)
    }
}
