// Match finder facade.
//
// Owns the hash index, the chain ring and one run segment list per byte
// value. The caller owns the buffer and passes it on every call, either
// unchanged or extended at the end; positions only move forward:
//
//   1. catch up: insert every position from the first uninserted one up
//      to the query (hash insertion, or one run segment for a run)
//   2. search: RLE or hash entry, then the level walk in `level.rs`
//
// Positions are absolute offsets into the buffer. Only the most recent
// `window_size - 1` positions can be matched.

use log::debug;

use super::config::{MIN_MATCH, WindowConfig};
use super::error::{MatchError, Result};
use super::level::{LevelSearch, Match, Query, Structures};
use super::scan::{hash4, is_run, read_u32_le};
use super::segments::RunSegmentTracker;
use super::table::{ChainTable, HashIndex, Link};

/// Sliding-window match finder with a compile-time window of
/// `1 << WINDOW_LOG` bytes.
///
/// ```
/// use morphmatch::MatchFinder;
///
/// let data = b"abcdefgh-abcdefgh";
/// let mut finder = MatchFinder::<16>::new().unwrap();
/// let m = finder.insert_and_find_best_match(data, 9, 8).unwrap();
/// assert_eq!((m.len, m.pos), (8, 0));
/// ```
pub struct MatchFinder<const WINDOW_LOG: u32 = 16> {
    hash: HashIndex,
    chain: ChainTable,
    runs: Vec<RunSegmentTracker>,
    search: LevelSearch,
    /// First position not yet inserted.
    next: usize,
}

impl<const WINDOW_LOG: u32> MatchFinder<WINDOW_LOG> {
    /// Window geometry; fails to compile for unsupported `WINDOW_LOG`.
    pub const CONFIG: WindowConfig = {
        assert!(
            WindowConfig::is_supported(WINDOW_LOG),
            "WINDOW_LOG must be within 8..=24"
        );
        WindowConfig::for_log(WINDOW_LOG)
    };

    /// Allocate all tables for an empty buffer.
    pub fn new() -> Result<Self> {
        let config = Self::CONFIG;
        let mut runs = Vec::new();
        runs.try_reserve_exact(256)
            .map_err(|_| MatchError::Allocation {
                requested_bytes: 256 * std::mem::size_of::<RunSegmentTracker>(),
            })?;
        for _ in 0..256 {
            runs.push(RunSegmentTracker::new()?);
        }

        let finder = Self {
            hash: HashIndex::new(config.hash_log)?,
            chain: ChainTable::new(config.window_size)?,
            runs,
            search: LevelSearch::new(),
            next: 0,
        };
        debug!(
            "match finder: window {} bytes, {} hash buckets, {} bytes of tables",
            config.window_size,
            config.hash_size,
            finder.memory_usage()
        );
        Ok(finder)
    }

    /// Forget every inserted position and start over at position 0,
    /// possibly with a different buffer.
    pub fn init(&mut self) {
        self.hash.reset();
        self.chain.reset();
        for tracker in &mut self.runs {
            tracker.reset();
        }
        self.search.reset();
        self.next = 0;
        debug!("match finder reset");
    }

    /// First position that has not been inserted yet.
    pub fn next_position(&self) -> usize {
        self.next
    }

    pub fn window_size(&self) -> usize {
        Self::CONFIG.window_size
    }

    /// Bytes held by the hash index, the chain ring and the run segment
    /// lists.
    pub fn memory_usage(&self) -> usize {
        self.hash.memory_usage()
            + self.chain.memory_usage()
            + self.runs.iter().map(RunSegmentTracker::memory_usage).sum::<usize>()
            + self.runs.capacity() * std::mem::size_of::<RunSegmentTracker>()
    }

    /// Insert every position before `pos`, then return the longest match
    /// for `data[pos..]` of at most `max_len` bytes.
    ///
    /// `max_len` is clamped to the bytes left in `data`. Below
    /// `MIN_MATCH` no search happens and `Match::NONE` is returned.
    pub fn insert_and_find_best_match(
        &mut self,
        data: &[u8],
        pos: usize,
        max_len: usize,
    ) -> Result<Match> {
        self.check(data, pos)?;
        self.catch_up(data, pos)?;

        let max_len = max_len.min(data.len() - pos);
        if max_len < MIN_MATCH {
            return Ok(Match::NONE);
        }

        let query = Query {
            data,
            pos,
            max_len,
            window: Self::CONFIG.window_size,
        };
        let found = self.search.find(
            &query,
            Structures {
                hash: &self.hash,
                chain: &mut self.chain,
                runs: &self.runs,
            },
        );
        debug_assert!(found.is_none() || found.len >= MIN_MATCH);
        Ok(found)
    }

    /// Insert positions up to `pos + len` without searching, typically the
    /// bytes covered by an accepted match. Returns how many positions the
    /// call newly covered.
    pub fn insert_many(&mut self, data: &[u8], pos: usize, len: usize) -> Result<usize> {
        self.check(data, pos)?;
        let target = pos
            .checked_add(len)
            .filter(|&t| t <= data.len())
            .ok_or(MatchError::PositionOutOfBounds {
                pos: pos.saturating_add(len),
                len: data.len(),
            })?;
        let before = self.next;
        self.catch_up(data, target)?;
        Ok(target - before)
    }

    fn check(&self, data: &[u8], pos: usize) -> Result<()> {
        if data.len() > Link::MAX_POSITION {
            return Err(MatchError::BufferTooLarge {
                len: data.len(),
                max: Link::MAX_POSITION,
            });
        }
        if pos > data.len() {
            return Err(MatchError::PositionOutOfBounds {
                pos,
                len: data.len(),
            });
        }
        if pos < self.next {
            return Err(MatchError::PositionRegression {
                pos,
                next: self.next,
            });
        }
        Ok(())
    }

    fn catch_up(&mut self, data: &[u8], target: usize) -> Result<()> {
        let mut pos = self.next;
        while pos < target {
            pos += self.insert_once(data, pos, target)?;
        }
        self.next = self.next.max(target);
        Ok(())
    }

    /// Insert one position, or a whole run starting there. Returns how far
    /// to advance.
    fn insert_once(&mut self, data: &[u8], pos: usize, limit: usize) -> Result<usize> {
        if pos + MIN_MATCH > data.len() {
            return Ok(limit - pos);
        }
        let sequence = read_u32_le(data, pos);
        if is_run(sequence) {
            let window = Self::CONFIG.window_size;
            return self.runs[data[pos] as usize].insert(&mut self.chain, data, pos, limit, window);
        }
        let h = hash4(sequence, self.hash.hash_log());
        self.hash.insert(&mut self.chain, h, pos);
        Ok(1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(data: &[u8], pos: usize, max_len: usize, window: usize, m: Match) {
        if m.is_none() {
            return;
        }
        assert!(m.len >= MIN_MATCH && m.len <= max_len, "len {} at {pos}", m.len);
        assert!(m.pos < pos && pos - m.pos < window, "pos {} at {pos}", m.pos);
        assert_eq!(&data[m.pos..m.pos + m.len], &data[pos..pos + m.len], "at {pos}");
    }

    fn text() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..300u32 {
            data.extend_from_slice(b"the quick brown fox ");
            data.extend_from_slice(format!("{} ", i % 17).as_bytes());
            if i % 5 == 0 {
                data.extend_from_slice(&[b'z'; 9]);
            }
            if i % 7 == 0 {
                data.extend_from_slice(b"jumps over the lazy dog ");
            }
        }
        data
    }

    #[test]
    fn repeated_four_bytes() {
        let data = [0u8, 1, 2, 3, 0, 1, 2, 3];
        let mut mf = MatchFinder::<16>::new().unwrap();
        let m = mf.insert_and_find_best_match(&data, 4, 4).unwrap();
        assert_eq!(m, Match { len: 4, pos: 0 });
    }

    #[test]
    fn run_capped_by_max_len() {
        let data = [b'a'; 16];
        let mut mf = MatchFinder::<16>::new().unwrap();
        let m = mf.insert_and_find_best_match(&data, 4, 12).unwrap();
        assert_eq!(m.len, 12);
        assert!(m.pos < 4);
        assert_eq!(&data[m.pos..m.pos + 12], &data[4..16]);
    }

    #[test]
    fn distinct_bytes_never_match() {
        let data: Vec<u8> = (0..=255).collect();
        let mut mf = MatchFinder::<16>::new().unwrap();
        for pos in 0..data.len() {
            let m = mf.insert_and_find_best_match(&data, pos, 64).unwrap();
            assert!(m.is_none(), "match at {pos}");
        }
    }

    #[test]
    fn every_position_is_valid() {
        let data = text();
        let mut mf = MatchFinder::<12>::new().unwrap();
        let mut found = 0;
        for pos in 0..data.len() {
            let m = mf.insert_and_find_best_match(&data, pos, 300).unwrap();
            assert_valid(&data, pos, 300, 1 << 12, m);
            found += m.is_some() as usize;
        }
        assert!(found > data.len() / 2);
    }

    #[test]
    fn greedy_parse_is_valid() {
        let data = text();
        let mut mf = MatchFinder::<16>::new().unwrap();
        let mut pos = 0;
        let mut covered = 0;
        while pos < data.len() {
            let max_len = data.len() - pos;
            let m = mf.insert_and_find_best_match(&data, pos, max_len).unwrap();
            assert_valid(&data, pos, max_len, 1 << 16, m);
            if m.is_some() {
                mf.insert_many(&data, pos, m.len).unwrap();
                covered += m.len;
                pos += m.len;
            } else {
                pos += 1;
            }
        }
        assert_eq!(mf.next_position(), data.len());
        assert!(covered > data.len() * 3 / 4);
    }

    #[test]
    fn repeated_query_is_allowed() {
        let data = text();
        let mut mf = MatchFinder::<16>::new().unwrap();
        let a = mf.insert_and_find_best_match(&data, 500, 64).unwrap();
        let b = mf.insert_and_find_best_match(&data, 500, 64).unwrap();
        assert_valid(&data, 500, 64, 1 << 16, a);
        assert_valid(&data, 500, 64, 1 << 16, b);
        assert_eq!(mf.next_position(), 500);
    }

    #[test]
    fn buffer_may_grow_between_calls() {
        let data = text();
        let mut mf = MatchFinder::<16>::new().unwrap();
        let mut pos = 0;
        for end in (64..data.len()).step_by(64) {
            let prefix = &data[..end];
            while pos + 8 <= end {
                let m = mf.insert_and_find_best_match(prefix, pos, 8).unwrap();
                assert_valid(prefix, pos, 8, 1 << 16, m);
                pos += 1;
            }
        }
    }

    #[test]
    fn one_at_a_time_insertion_matches_bulk() {
        let data = text();
        let mut single = MatchFinder::<16>::new().unwrap();
        for pos in 0..data.len() {
            single.insert_many(&data, pos, 1).unwrap();
        }
        let mut bulk = MatchFinder::<16>::new().unwrap();
        bulk.insert_many(&data, 0, data.len()).unwrap();

        assert_eq!(single.next_position(), bulk.next_position());
        assert_eq!(single.hash.buckets(), bulk.hash.buckets());
        assert_eq!(single.chain.entries(), bulk.chain.entries());
        for byte in 0..256 {
            assert_eq!(
                single.runs[byte].segments(),
                bulk.runs[byte].segments(),
                "byte {byte}"
            );
        }
    }

    #[test]
    fn window_boundary() {
        let pattern: Vec<u8> = (0..8).collect();

        // Second copy 255 bytes later: inside a 256-byte window.
        let mut near = pattern.clone();
        near.extend(8..=254u8);
        near.extend_from_slice(&pattern);
        assert_eq!(near.len(), 263);
        let mut mf = MatchFinder::<8>::new().unwrap();
        let m = mf.insert_and_find_best_match(&near, 255, 8).unwrap();
        assert_eq!(m, Match { len: 8, pos: 0 });

        // 256 bytes later: out of reach.
        let mut far = pattern.clone();
        far.extend(8..=255u8);
        far.extend_from_slice(&pattern);
        mf.init();
        let m = mf.insert_and_find_best_match(&far, 256, 8).unwrap();
        assert!(m.is_none());
    }

    #[test]
    fn small_max_len_returns_none_but_inserts() {
        let data = b"abcdabcdabcd";
        let mut mf = MatchFinder::<16>::new().unwrap();
        let m = mf.insert_and_find_best_match(data, 4, 3).unwrap();
        assert!(m.is_none());
        assert_eq!(mf.next_position(), 4);
        let m = mf.insert_and_find_best_match(data, 10, 8).unwrap();
        assert!(m.is_none(), "only two bytes remain");
        assert_eq!(mf.next_position(), 10);
    }

    #[test]
    fn precondition_errors_leave_state_untouched() {
        let data = text();
        let mut mf = MatchFinder::<16>::new().unwrap();
        mf.insert_and_find_best_match(&data, 100, 16).unwrap();

        assert_eq!(
            mf.insert_and_find_best_match(&data, 50, 16),
            Err(MatchError::PositionRegression { pos: 50, next: 100 })
        );
        assert_eq!(
            mf.insert_and_find_best_match(&data, data.len() + 1, 16),
            Err(MatchError::PositionOutOfBounds {
                pos: data.len() + 1,
                len: data.len()
            })
        );
        assert!(matches!(
            mf.insert_many(&data, 100, data.len()),
            Err(MatchError::PositionOutOfBounds { .. })
        ));
        assert_eq!(mf.next_position(), 100);
    }

    #[test]
    fn insert_many_reports_newly_covered_positions() {
        let data = text();
        let mut mf = MatchFinder::<16>::new().unwrap();
        assert_eq!(mf.insert_many(&data, 0, 10).unwrap(), 10);
        assert_eq!(mf.insert_many(&data, 20, 5).unwrap(), 15);
        assert_eq!(mf.insert_many(&data, 25, 0).unwrap(), 0);
        assert_eq!(mf.next_position(), 25);
    }

    #[test]
    fn init_allows_a_new_buffer() {
        let first = text();
        let second: Vec<u8> = first.iter().rev().copied().collect();
        let mut mf = MatchFinder::<16>::new().unwrap();
        mf.insert_many(&first, 0, first.len()).unwrap();
        mf.init();
        assert_eq!(mf.next_position(), 0);
        for pos in 0..second.len() {
            let m = mf.insert_and_find_best_match(&second, pos, 64).unwrap();
            assert_valid(&second, pos, 64, 1 << 16, m);
        }
    }

    #[test]
    fn memory_is_reported() {
        let mf = MatchFinder::<16>::new().unwrap();
        assert!(mf.memory_usage() >= (1 << 16) * 8 + (1 << 15) * 4);
        assert_eq!(mf.window_size(), 1 << 16);
    }
}
