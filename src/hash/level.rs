// Level search: the per-query walk of the morphing match chain.
//
// Level `L` holds candidates known to share at least `L` leading bytes with
// the query. The walk starts either from the hash bucket (base level
// MIN_MATCH - 1, collisions still possible) or from a run segment (base
// level = run length), and moves between levels:
//
//   - no improvement (`mlt == L`): stay on level L; a second candidate
//     diverging on the same byte as an earlier one is spliced under it
//     (dedup), parked with a LEVEL_DOWN marker or promoted through its
//     existing level-up link
//   - improvement (`mlt > L`): relink the candidate into level `mlt`, or
//     open a new level through the single outstanding gateway slot
//   - a set level-up link is followed directly (bytes proven by earlier
//     queries are never compared again)
//
// Every relink writes the chain table, so the structure left behind is
// what makes later queries cheap.

use super::config::MIN_MATCH;
use super::scan::{forward_match, hash4, is_run, read_u32_le, run_length};
use super::segments::RunSegmentTracker;
use super::table::{ChainTable, HashIndex, Link, Slot};

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

/// Best match for one query position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Match {
    /// Match length; 0 means no usable match.
    pub len: usize,
    /// Earlier position the match copies from.
    pub pos: usize,
}

impl Match {
    /// No usable match.
    pub const NONE: Match = Match { len: 0, pos: 0 };

    #[inline]
    pub fn is_none(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_some(&self) -> bool {
        self.len != 0
    }

    /// Backward distance from the query position `at`.
    #[inline]
    pub fn distance(&self, at: usize) -> usize {
        at - self.pos
    }
}

// ---------------------------------------------------------------------------
// Search inputs
// ---------------------------------------------------------------------------

/// One query: `data[pos..pos + max_len]` is matched against the window.
pub struct Query<'d> {
    pub data: &'d [u8],
    pub pos: usize,
    /// Already clamped to the buffer; at least MIN_MATCH.
    pub max_len: usize,
    pub window: usize,
}

impl Query<'_> {
    /// Position referenced by `link` if it may be matched from this query.
    #[inline(always)]
    fn eligible(&self, link: Link) -> Option<usize> {
        link.position()
            .filter(|&r| r < self.pos && self.pos - r < self.window)
    }
}

/// Structures the search reads and relinks.
pub struct Structures<'t> {
    pub hash: &'t HashIndex,
    pub chain: &'t mut ChainTable,
    pub runs: &'t [RunSegmentTracker],
}

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Step {
    /// Visit `cursor.reference` at `cursor.level`.
    Walk,
    /// Candidate stays on the current level; follow its sibling link.
    SameLevel(usize),
    /// Candidate was relinked elsewhere; extract it and follow its level-up.
    CheckLevelUp(usize),
    /// Stop before the walk would leave the verified levels.
    Done,
}

struct Cursor {
    level: usize,
    max_level: usize,
    best: Match,
    gateway: Option<Slot>,
    reference: Link,
}

/// Per-query scratch state, reused across queries.
pub struct LevelSearch {
    /// Tail of each level, indexed by `level - base`.
    levels: Vec<usize>,
    base: usize,
    track_step: [u16; 256],
    track_slot: [Slot; 256],
    step: u16,
    /// Range `[start, end)` already known to hold one repeated byte.
    run_hint: Option<(usize, usize)>,
}

impl Default for LevelSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelSearch {
    pub fn new() -> Self {
        Self {
            levels: Vec::with_capacity(64),
            base: 0,
            track_step: [0; 256],
            track_slot: [Slot::NextTry(0); 256],
            step: 0,
            run_hint: None,
        }
    }

    /// Forget buffer-dependent state.
    pub fn reset(&mut self) {
        self.levels.clear();
        self.run_hint = None;
    }

    /// Find the best match for `query`. Every position before
    /// `query.pos` that will ever be inserted must already be.
    pub fn find(&mut self, query: &Query<'_>, tables: Structures<'_>) -> Match {
        debug_assert!(query.max_len >= MIN_MATCH);
        debug_assert!(query.pos + query.max_len <= query.data.len());

        let Structures { hash, chain, runs } = tables;
        let sequence = read_u32_le(query.data, query.pos);
        if is_run(sequence) {
            let byte = query.data[query.pos];
            self.find_run(query, chain, &runs[byte as usize])
        } else {
            self.find_hashed(query, hash, chain, sequence)
        }
    }

    // -----------------------------------------------------------------------
    // Entry paths
    // -----------------------------------------------------------------------

    /// RLE entry: the query starts with at least MIN_MATCH copies of one byte.
    fn find_run(
        &mut self,
        query: &Query<'_>,
        chain: &mut ChainTable,
        runs: &RunSegmentTracker,
    ) -> Match {
        let (data, ip) = (query.data, query.pos);
        let byte = data[ip];
        let limit = ip + query.max_len;

        let (hint_start, hint_end) = match self.run_hint {
            Some((s, e)) if s <= ip && ip + MIN_MATCH <= e => (s, e),
            _ => (ip, ip + MIN_MATCH),
        };
        let mut end = hint_end.min(limit);
        if end < limit {
            end += run_length(&data[end..], byte, limit - end);
        }
        self.run_hint = Some((hint_start, end.max(hint_end)));
        let len = end - ip;

        let adjacent = ip > 0 && data[ip - 1] == byte;
        let candidate = runs
            .newest_at_least(len)
            .and_then(|s| s.end.checked_sub(len))
            .filter(|&c| c < ip && ip - c < query.window);

        let Some(candidate) = candidate else {
            chain.set_entry(ip, Link::NONE, Link::NONE);
            return if adjacent {
                Match { len, pos: ip - 1 }
            } else {
                Match::NONE
            };
        };

        chain.set_entry(ip, Link::to(candidate), Link::NONE);
        self.begin(len, ip);
        let cursor = Cursor {
            level: len,
            max_level: len,
            best: Match {
                len,
                pos: if adjacent { ip - 1 } else { candidate },
            },
            // A bare MIN_MATCH run may continue with non-repeating bytes.
            gateway: (len == MIN_MATCH).then_some(Slot::LevelUp(ip)),
            reference: Link::to(candidate),
        };
        self.walk(query, chain, cursor)
    }

    /// Hash entry: walk the bucket chain at the base level, skipping
    /// collisions, until a candidate with a level-up link is met.
    fn find_hashed(
        &mut self,
        query: &Query<'_>,
        hash: &HashIndex,
        chain: &mut ChainTable,
        sequence: u32,
    ) -> Match {
        const BASE: usize = MIN_MATCH - 1;
        let (data, ip) = (query.data, query.pos);

        let mut reference = hash.lookup(hash4(sequence, hash.hash_log()));
        if reference.is_none() {
            return Match::NONE;
        }

        chain.set_entry(ip, Link::NONE, Link::NONE);
        self.begin(BASE, ip);
        let mut cursor = Cursor {
            level: BASE,
            max_level: BASE,
            best: Match::NONE,
            gateway: Some(Slot::LevelUp(ip)),
            reference: Link::NONE,
        };

        while let Some(r) = query.eligible(reference) {
            if cursor.best.len >= query.max_len {
                break;
            }
            if read_u32_le(data, r) != sequence {
                self.set_tail(BASE, r);
                reference = chain.next_try(r);
                continue;
            }

            let mlt = MIN_MATCH
                + forward_match(
                    &data[ip + MIN_MATCH..],
                    &data[r + MIN_MATCH..],
                    query.max_len - MIN_MATCH,
                );
            if mlt > cursor.best.len {
                cursor.best = Match { len: mlt, pos: r };
            }

            if mlt <= cursor.max_level {
                self.append(chain, mlt, r);
            } else if let Some(gateway) = cursor.gateway {
                self.open_level(chain, &mut cursor, gateway, r, mlt);
            } else {
                cursor.gateway = Some(Slot::LevelUp(r));
                self.append(chain, cursor.max_level, r);
            }

            // Extraction from the base level.
            chain.set_next_try(self.tail(BASE), chain.next_try(r));
            let up = chain.level_up(r);
            if up.is_some() {
                chain.set_entry(r, Link::NONE, Link::NONE);
                cursor.level += 1;
                chain.set_next_try(self.tail(cursor.level), up);
                reference = up;
                break;
            }
            reference = chain.next_try(r);
            chain.set_next_try(r, Link::NONE);
        }

        if cursor.best.is_none() {
            return Match::NONE;
        }
        cursor.reference = reference;
        self.walk(query, chain, cursor)
    }

    // -----------------------------------------------------------------------
    // Level walk
    // -----------------------------------------------------------------------

    fn walk(&mut self, query: &Query<'_>, chain: &mut ChainTable, mut cursor: Cursor) -> Match {
        let (data, ip) = (query.data, query.pos);
        let mut reached_max = false;
        let mut step = Step::Walk;

        loop {
            step = match step {
                Step::Walk => {
                    let Some(r) = query.eligible(cursor.reference) else {
                        break;
                    };
                    if cursor.best.len >= query.max_len {
                        reached_max = true;
                        break;
                    }
                    if self.step == 0 {
                        self.track_step = [0; 256];
                        self.step = 1;
                    }

                    let level = cursor.level;
                    let mlt = level
                        + forward_match(&data[ip + level..], &data[r + level..], query.max_len - level);
                    if mlt == level {
                        self.no_improvement(data, chain, &mut cursor, r)
                    } else {
                        self.improvement(chain, &mut cursor, r, mlt)
                    }
                }
                Step::SameLevel(r) => self.continue_same_level(chain, &mut cursor, r),
                Step::CheckLevelUp(r) => self.check_level_up(chain, &mut cursor, r),
                Step::Done => break,
            };
        }

        // Early end: nothing left can extend past the open gateway. Unknown
        // when the walk stopped on the length cap.
        if !reached_max && let Some(gateway) = cursor.gateway {
            chain.set(gateway, Link::EXHAUSTED);
        }

        let mut best = cursor.best;
        best.len = best.len.min(query.max_len);
        best
    }

    /// `ref` shares exactly the current level with the query.
    fn no_improvement(
        &mut self,
        data: &[u8],
        chain: &mut ChainTable,
        cursor: &mut Cursor,
        r: usize,
    ) -> Step {
        let level = cursor.level;
        let c = data[r + level] as usize;

        if self.track_step[c] == self.step {
            // An earlier sibling diverged on the same byte: hang `r` under it.
            let next = chain.next_try(r);
            chain.set(self.track_slot[c], Link::to(r));
            chain.set_next_try(self.tail(level), next);
            let up = chain.level_up(r);
            if up.is_some() {
                chain.set_entry(r, up, Link::NONE);
                self.track_step[c] = 0;
            } else {
                chain.set_next_try(r, Link::LEVEL_DOWN);
                self.track_slot[c] = Slot::NextTry(r);
            }

            if next == Link::LEVEL_DOWN {
                chain.set_next_try(self.tail(level), Link::NONE);
                return self.descend(chain, cursor, r);
            }
            cursor.reference = next;
            return Step::Walk;
        }

        // A series already hangs under `r`; leave it alone.
        if chain.level_up(r).is_none() {
            self.track_step[c] = self.step;
            self.track_slot[c] = Slot::LevelUp(r);
        }
        Step::SameLevel(r)
    }

    /// `ref` shares `mlt` bytes, more than the current level.
    fn improvement(
        &mut self,
        chain: &mut ChainTable,
        cursor: &mut Cursor,
        r: usize,
        mlt: usize,
    ) -> Step {
        if mlt > cursor.best.len {
            cursor.best = Match { len: mlt, pos: r };
        }

        if mlt <= cursor.max_level {
            self.append(chain, mlt, r);
            return Step::CheckLevelUp(r);
        }

        if let Some(gateway) = cursor.gateway {
            self.open_level(chain, cursor, gateway, r, mlt);
            return Step::CheckLevelUp(r);
        }

        if cursor.max_level == cursor.level {
            let up = chain.level_up(r);
            if up.is_none() {
                cursor.gateway = Some(Slot::LevelUp(r));
                return Step::SameLevel(r);
            }
            // Climb through the existing series; its tail is set on the
            // first visit at the new level.
            self.set_tail(cursor.level, r);
            cursor.reference = up;
            cursor.max_level += 1;
            cursor.level += 1;
            self.levels.push(r);
            self.bump();
            return Step::Walk;
        }

        cursor.gateway = Some(Slot::LevelUp(r));
        self.append(chain, cursor.max_level, r);
        Step::CheckLevelUp(r)
    }

    fn continue_same_level(&mut self, chain: &mut ChainTable, cursor: &mut Cursor, r: usize) -> Step {
        self.set_tail(cursor.level, r);
        let next = chain.next_try(r);
        if next == Link::LEVEL_DOWN {
            chain.set_next_try(r, Link::NONE);
            return self.descend(chain, cursor, r);
        }
        cursor.reference = next;
        Step::Walk
    }

    fn check_level_up(&mut self, chain: &mut ChainTable, cursor: &mut Cursor, r: usize) -> Step {
        let level = cursor.level;
        chain.set_next_try(self.tail(level), chain.next_try(r));

        let up = chain.level_up(r);
        if up.is_some() {
            chain.set_entry(r, Link::NONE, Link::NONE);
            cursor.level += 1;
            self.bump();
            chain.set_next_try(self.tail(cursor.level), up);
            cursor.reference = up;
            return Step::Walk;
        }

        let next = chain.next_try(r);
        chain.set_next_try(r, Link::NONE);
        if next == Link::LEVEL_DOWN {
            chain.set_next_try(self.tail(level), Link::NONE);
            return self.descend(chain, cursor, r);
        }
        cursor.reference = next;
        Step::Walk
    }

    /// Resume one level lower, past every sibling newer than `from`.
    fn descend(&mut self, chain: &mut ChainTable, cursor: &mut Cursor, from: usize) -> Step {
        // Never fall back into the base level of a hash walk: its chain is
        // not verified.
        if cursor.level <= self.base.max(MIN_MATCH) {
            cursor.reference = Link::NONE;
            return Step::Done;
        }
        cursor.level -= 1;
        self.bump();

        let level = cursor.level;
        let mut next = chain.next_try(self.tail(level));
        while let Some(p) = next.position().filter(|&p| p > from) {
            self.set_tail(level, p);
            next = chain.next_try(p);
        }
        cursor.reference = next;
        Step::Walk
    }

    // -----------------------------------------------------------------------
    // Level list helpers
    // -----------------------------------------------------------------------

    fn begin(&mut self, base: usize, root: usize) {
        self.levels.clear();
        self.levels.push(root);
        self.base = base;
        self.step = 0;
    }

    #[inline(always)]
    fn tail(&self, level: usize) -> usize {
        self.levels[level - self.base]
    }

    #[inline(always)]
    fn set_tail(&mut self, level: usize, pos: usize) {
        self.levels[level - self.base] = pos;
    }

    /// Append `r` to the chain of `level`.
    #[inline(always)]
    fn append(&mut self, chain: &mut ChainTable, level: usize, r: usize) {
        chain.set_next_try(self.tail(level), Link::to(r));
        self.set_tail(level, r);
    }

    /// Attach `r` through the gateway as the first member of a new level.
    fn open_level(
        &mut self,
        chain: &mut ChainTable,
        cursor: &mut Cursor,
        gateway: Slot,
        r: usize,
        mlt: usize,
    ) {
        chain.set(gateway, Link::to(r));
        cursor.max_level += 1;
        self.levels.push(r);
        cursor.gateway = (mlt > cursor.max_level).then_some(Slot::LevelUp(r));
    }

    #[inline(always)]
    fn bump(&mut self) {
        self.step = self.step.wrapping_add(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_helpers() {
        assert!(Match::NONE.is_none());
        let m = Match { len: 5, pos: 10 };
        assert!(m.is_some());
        assert_eq!(m.distance(14), 4);
    }

    #[test]
    fn eligibility_respects_window() {
        let data = [0u8; 64];
        let q = Query {
            data: &data,
            pos: 40,
            max_len: 8,
            window: 16,
        };
        assert_eq!(q.eligible(Link::to(39)), Some(39));
        assert_eq!(q.eligible(Link::to(25)), Some(25));
        assert_eq!(q.eligible(Link::to(24)), None);
        assert_eq!(q.eligible(Link::to(40)), None);
        assert_eq!(q.eligible(Link::LEVEL_DOWN), None);
        assert_eq!(q.eligible(Link::EXHAUSTED), None);
    }

    #[test]
    fn hashed_search_finds_single_candidate() {
        let data = b"wxyzABCDwxyzABCE";
        let mut chain = ChainTable::new(256).unwrap();
        let mut hash = HashIndex::new(7).unwrap();
        for p in 0..8 {
            let seq = read_u32_le(data, p);
            hash.insert(&mut chain, hash4(seq, 7), p);
        }
        let runs: Vec<RunSegmentTracker> = (0..256).map(|_| RunSegmentTracker::new().unwrap()).collect();
        let mut search = LevelSearch::new();
        let q = Query {
            data,
            pos: 8,
            max_len: 8,
            window: 256,
        };
        let m = search.find(
            &q,
            Structures {
                hash: &hash,
                chain: &mut chain,
                runs: &runs,
            },
        );
        assert_eq!(m, Match { len: 7, pos: 0 });
    }

    #[test]
    fn run_search_without_history_uses_adjacent_byte() {
        let data = [b'a'; 32];
        let mut chain = ChainTable::new(256).unwrap();
        let hash = HashIndex::new(7).unwrap();
        let runs: Vec<RunSegmentTracker> = (0..256).map(|_| RunSegmentTracker::new().unwrap()).collect();
        let mut search = LevelSearch::new();
        let q = Query {
            data: &data,
            pos: 5,
            max_len: 20,
            window: 256,
        };
        let m = search.find(
            &q,
            Structures {
                hash: &hash,
                chain: &mut chain,
                runs: &runs,
            },
        );
        assert_eq!(m, Match { len: 20, pos: 4 });

        // Position 0 has nothing before it.
        let q0 = Query {
            data: &data,
            pos: 0,
            max_len: 20,
            window: 256,
        };
        let m0 = search.find(
            &q0,
            Structures {
                hash: &hash,
                chain: &mut chain,
                runs: &runs,
            },
        );
        assert!(m0.is_none());
    }

    #[test]
    fn run_hint_is_reused_and_bounded() {
        let mut data = vec![b'a'; 100];
        data.push(b'b');
        let mut chain = ChainTable::new(256).unwrap();
        let hash = HashIndex::new(7).unwrap();
        let runs: Vec<RunSegmentTracker> = (0..256).map(|_| RunSegmentTracker::new().unwrap()).collect();
        let mut search = LevelSearch::new();
        for pos in 1..=96 {
            let max_len = data.len() - pos;
            let q = Query {
                data: &data,
                pos,
                max_len,
                window: 256,
            };
            let m = search.find(
                &q,
                Structures {
                    hash: &hash,
                    chain: &mut chain,
                    runs: &runs,
                },
            );
            assert_eq!(m, Match { len: 100 - pos, pos: pos - 1 });
        }
        search.reset();
        assert!(search.run_hint.is_none());
    }
}
