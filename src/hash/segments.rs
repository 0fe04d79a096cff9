// Run segment tracking for the RLE fast path.
//
// Inside a long run of one byte every position hashes to the same bucket,
// so a plain hash chain costs O(window) per query. Instead each byte value
// keeps a stack of the runs seen so far (`RunSegment { end, len }`), newest
// on top, lengths strictly decreasing towards the top. A run of `n`
// repeated bytes ending at `end` implicitly contains the candidate
// `end - n` for every `n <= len`.
//
// Recording a run threads `next_try` of each of its positions `end - n` to
// the nearest older segment holding at least `n` bytes, so chains reached
// through those positions keep working. Shorter older segments are popped
// (the new one supersedes them) and out-of-window ones are dropped.
//
// Index 0 of every stack is a sentinel that is never in the window; scans
// stop on it without a separate emptiness check.

use log::debug;

use super::config::{INITIAL_SEGMENT_CAPACITY, MIN_MATCH};
use super::error::{MatchError, Result};
use super::scan::run_length;
use super::table::{ChainTable, Link};

/// One observed run of a repeated byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSegment {
    /// First position after the run.
    pub end: usize,
    /// Recorded run length, clamped to `window - 1`.
    pub len: u32,
}

impl RunSegment {
    /// Bottom-of-stack marker: longer than any run, never in the window.
    pub const SENTINEL: RunSegment = RunSegment {
        end: 0,
        len: u32::MAX,
    };

    #[inline(always)]
    pub fn is_sentinel(&self) -> bool {
        self.len == u32::MAX
    }

    /// Whether the segment end is within `window` of `pos`.
    #[inline(always)]
    pub fn is_live(&self, pos: usize, window: usize) -> bool {
        !self.is_sentinel() && pos.saturating_sub(self.end) < window
    }

    /// Link to the implicit candidate `end - n`.
    #[inline(always)]
    fn candidate(&self, n: usize) -> Link {
        if self.is_sentinel() {
            return Link::NONE;
        }
        self.end.checked_sub(n).map_or(Link::NONE, Link::to)
    }
}

/// Per-byte stack of recorded runs.
pub struct RunSegmentTracker {
    segments: Vec<RunSegment>,
}

impl RunSegmentTracker {
    /// Allocate the initial stack holding only the sentinel.
    pub fn new() -> Result<Self> {
        let mut segments = Vec::new();
        segments
            .try_reserve_exact(INITIAL_SEGMENT_CAPACITY)
            .map_err(|_| MatchError::Allocation {
                requested_bytes: INITIAL_SEGMENT_CAPACITY * std::mem::size_of::<RunSegment>(),
            })?;
        segments.push(RunSegment::SENTINEL);
        Ok(Self { segments })
    }

    /// Drop every recorded run, keeping the allocation.
    pub fn reset(&mut self) {
        self.segments.truncate(1);
    }

    /// Recorded runs, oldest first (sentinel excluded).
    pub fn segments(&self) -> &[RunSegment] {
        &self.segments[1..]
    }

    pub fn len(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn capacity(&self) -> usize {
        self.segments.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.segments.capacity() * std::mem::size_of::<RunSegment>()
    }

    /// Newest recorded run holding at least `len` bytes.
    ///
    /// Older runs are never closer, so only this one is worth a window check.
    pub fn newest_at_least(&self, len: usize) -> Option<RunSegment> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.len as usize >= len)
            .filter(|s| !s.is_sentinel())
            .copied()
    }

    /// Insert the run of repeated bytes starting at `pos`.
    ///
    /// Caller guarantees `data[pos..pos + 4]` are equal and `pos < limit`.
    /// Returns how many positions the caller may skip. If the run reaches
    /// `limit + MIN_MATCH` or the end of `data` nothing is recorded and the
    /// returned skip carries the caller past `limit`; the run is picked up
    /// again, whole, by a later insertion.
    pub fn insert(
        &mut self,
        chain: &mut ChainTable,
        data: &[u8],
        pos: usize,
        limit: usize,
        window: usize,
    ) -> Result<usize> {
        let byte = data[pos];
        let scan_end = (limit + MIN_MATCH).min(data.len());
        let fwd_start = pos + MIN_MATCH;
        let end = fwd_start + run_length(&data[fwd_start..], byte, scan_end - fwd_start);
        if end == scan_end {
            return Ok(scan_end - pos);
        }

        let behind = data[..pos]
            .iter()
            .rev()
            .take(window - 1)
            .take_while(|&&b| b == byte)
            .count();
        let size = (end - (pos - behind)).min(window - 1);

        // Older runs no longer than this one are superseded: their implicit
        // positions become reachable from ours.
        let mut n = MIN_MATCH;
        loop {
            let top = self.top();
            if top.len as usize > size || !top.is_live(pos, window) {
                break;
            }
            while n <= top.len as usize {
                chain.set_entry(end - n, top.candidate(n), Link::NONE);
                n += 1;
            }
            self.segments.pop();
        }

        if !self.top().is_live(pos, window) {
            self.segments.truncate(1);
        }

        let top = self.top();
        while n <= size {
            chain.set_entry(end - n, top.candidate(n), Link::NONE);
            n += 1;
        }

        self.push(
            RunSegment {
                end,
                len: size as u32,
            },
            pos,
            window,
        )?;

        Ok(end - pos - (MIN_MATCH - 1))
    }

    #[inline(always)]
    fn top(&self) -> RunSegment {
        self.segments[self.segments.len() - 1]
    }

    fn push(&mut self, segment: RunSegment, pos: usize, window: usize) -> Result<()> {
        if self.segments.len() == self.segments.capacity() {
            self.compact(pos, window);
        }
        if self.segments.len() == self.segments.capacity() {
            let additional = self.segments.capacity();
            self.segments
                .try_reserve_exact(additional)
                .map_err(|_| MatchError::Allocation {
                    requested_bytes: additional * std::mem::size_of::<RunSegment>(),
                })?;
            debug!(
                "run segment list grown to {} entries",
                self.segments.capacity()
            );
        }
        self.segments.push(segment);
        Ok(())
    }

    /// Remove the out-of-window prefix of the stack (just above the sentinel).
    fn compact(&mut self, pos: usize, window: usize) {
        let first_live = self.segments[1..]
            .iter()
            .position(|s| s.is_live(pos, window))
            .map_or(self.segments.len(), |i| i + 1);
        if first_live > 1 {
            self.segments.drain(1..first_live);
            debug!(
                "run segment list compacted: {} stale entries dropped",
                first_live - 1
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
