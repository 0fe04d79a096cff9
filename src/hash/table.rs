// Hash index and chain table for the match finder.
//
// Two structures:
//   - **HashIndex**: bucket -> most recently inserted position whose
//     4-byte prefix hashes there.
//   - **ChainTable**: ring buffer with one `ChainEntry` per window slot
//     (`pos & (window - 1)`). `next_try` threads siblings at the same
//     level (older first), `level_up` points at candidates proven to share
//     one more byte.
//
// Slots store biased 32-bit `Link`s so that 0 means "empty" and two small
// marker values fit below every real position. A slot's content is only
// meaningful while its position is inside the window; callers check the
// distance before following any link.

use super::error::{MatchError, Result};

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Biased 32-bit reference stored in hash buckets and chain slots.
///
/// Ordering is `NONE < LEVEL_DOWN < EXHAUSTED < positions`, and positions
/// compare in position order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Link(u32);

impl Link {
    /// End of chain.
    pub const NONE: Link = Link(0);
    /// Continue one level lower (parks a deduplicated candidate).
    pub const LEVEL_DOWN: Link = Link(1);
    /// Nothing longer exists below this node.
    pub const EXHAUSTED: Link = Link(2);

    const BIAS: u32 = 3;

    /// Largest position a link can encode.
    pub const MAX_POSITION: usize = (u32::MAX - Self::BIAS) as usize;

    /// Link to `pos`. Caller guarantees `pos <= MAX_POSITION`.
    #[inline(always)]
    pub fn to(pos: usize) -> Link {
        debug_assert!(pos <= Self::MAX_POSITION);
        Link(pos as u32 + Self::BIAS)
    }

    /// The referenced position, or `None` for markers and empty links.
    #[inline(always)]
    pub fn position(self) -> Option<usize> {
        self.0.checked_sub(Self::BIAS).map(|p| p as usize)
    }

    #[inline(always)]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[inline(always)]
    pub fn is_some(self) -> bool {
        self != Self::NONE
    }
}

// ---------------------------------------------------------------------------
// Chain table
// ---------------------------------------------------------------------------

/// Link pair held by one ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainEntry {
    pub next_try: Link,
    pub level_up: Link,
}

/// One link field of one position's slot.
///
/// Stands in for a pointer to a link: the search keeps at most one gateway
/// and one dedup target per byte value, and writes through them later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    NextTry(usize),
    LevelUp(usize),
}

/// Ring buffer of `ChainEntry`, one per window position.
pub struct ChainTable {
    entries: Vec<ChainEntry>,
    mask: usize,
}

impl ChainTable {
    /// Allocate a zeroed ring of `window_size` slots (a power of two).
    pub fn new(window_size: usize) -> Result<Self> {
        debug_assert!(window_size.is_power_of_two());
        Ok(Self {
            entries: zeroed_vec(window_size)?,
            mask: window_size - 1,
        })
    }

    /// Forget every link.
    pub fn reset(&mut self) {
        self.entries.fill(ChainEntry::default());
    }

    #[inline(always)]
    fn slot(&self, pos: usize) -> usize {
        pos & self.mask
    }

    #[inline(always)]
    pub fn next_try(&self, pos: usize) -> Link {
        self.entries[self.slot(pos)].next_try
    }

    #[inline(always)]
    pub fn level_up(&self, pos: usize) -> Link {
        self.entries[self.slot(pos)].level_up
    }

    #[inline(always)]
    pub fn set_next_try(&mut self, pos: usize, link: Link) {
        let slot = self.slot(pos);
        self.entries[slot].next_try = link;
    }

    #[inline(always)]
    pub fn set_level_up(&mut self, pos: usize, link: Link) {
        let slot = self.slot(pos);
        self.entries[slot].level_up = link;
    }

    /// Overwrite both links of `pos`.
    #[inline(always)]
    pub fn set_entry(&mut self, pos: usize, next_try: Link, level_up: Link) {
        let slot = self.slot(pos);
        self.entries[slot] = ChainEntry { next_try, level_up };
    }

    /// Write through a slot reference.
    #[inline(always)]
    pub fn set(&mut self, slot: Slot, link: Link) {
        match slot {
            Slot::NextTry(pos) => self.set_next_try(pos, link),
            Slot::LevelUp(pos) => self.set_level_up(pos, link),
        }
    }

    /// Number of ring slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes held by the ring.
    pub fn memory_usage(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<ChainEntry>()
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }
}

// ---------------------------------------------------------------------------
// Hash index
// ---------------------------------------------------------------------------

/// Bucket array keyed by the multiplicative hash of a 4-byte prefix.
pub struct HashIndex {
    buckets: Vec<Link>,
    hash_log: u32,
}

impl HashIndex {
    /// Allocate `1 << hash_log` empty buckets.
    pub fn new(hash_log: u32) -> Result<Self> {
        Ok(Self {
            buckets: zeroed_vec(1usize << hash_log)?,
            hash_log,
        })
    }

    pub fn reset(&mut self) {
        self.buckets.fill(Link::NONE);
    }

    pub fn hash_log(&self) -> u32 {
        self.hash_log
    }

    /// Bucket head for hash `h`.
    #[inline(always)]
    pub fn lookup(&self, h: usize) -> Link {
        self.buckets[h]
    }

    /// Push `pos` on the front of bucket `h`, threading the old head
    /// through `chain` and clearing the position's level link.
    #[inline(always)]
    pub fn insert(&mut self, chain: &mut ChainTable, h: usize, pos: usize) {
        chain.set_entry(pos, self.buckets[h], Link::NONE);
        self.buckets[h] = Link::to(pos);
    }

    /// Bytes held by the bucket array.
    pub fn memory_usage(&self) -> usize {
        self.buckets.capacity() * std::mem::size_of::<Link>()
    }

    #[cfg(test)]
    pub(crate) fn buckets(&self) -> &[Link] {
        &self.buckets
    }
}

/// Allocate `len` default values, reporting failure instead of aborting.
fn zeroed_vec<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| MatchError::Allocation {
            requested_bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    v.resize(len, T::default());
    Ok(v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
