// Byte-scanning primitives shared by insertion and search.
//
// - 4-byte prefix reads and the multiplicative bucket hash
// - forward common-prefix length (8 bytes per step)
// - run length of one repeated byte (8 bytes per step)
//
// All functions are bounds-checked against their slices; callers clamp
// `max` to the buffer so nothing here reads past the end.

use super::config::HASH_MULTIPLIER;

/// Little-endian 4-byte prefix at `pos`. Caller guarantees `pos + 4 <= data.len()`.
#[inline(always)]
pub fn read_u32_le(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// Bucket index for a 4-byte prefix: top `hash_log` bits of the product.
#[inline(always)]
pub fn hash4(sequence: u32, hash_log: u32) -> usize {
    (sequence.wrapping_mul(HASH_MULTIPLIER) >> (32 - hash_log)) as usize
}

/// True when all four bytes of `sequence` are equal.
#[inline(always)]
pub fn is_run(sequence: u32) -> bool {
    sequence == (sequence & 0xFF).wrapping_mul(0x0101_0101)
}

#[inline(always)]
fn load_u64(chunk: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(chunk);
    u64::from_le_bytes(word)
}

/// Length of the common prefix of `s1` and `s2`, at most `n`.
#[inline]
pub fn forward_match(s1: &[u8], s2: &[u8], n: usize) -> usize {
    let n = n.min(s1.len()).min(s2.len());
    let (a, b) = (&s1[..n], &s2[..n]);
    let mut i = 0;

    for (ca, cb) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
        let xor = load_u64(ca) ^ load_u64(cb);
        if xor != 0 {
            // Little-endian load: the lowest set bit is the first differing byte.
            return i + (xor.trailing_zeros() / 8) as usize;
        }
        i += 8;
    }

    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

/// Number of leading bytes of `data` equal to `byte`, at most `max`.
#[inline]
pub fn run_length(data: &[u8], byte: u8, max: usize) -> usize {
    let data = &data[..max.min(data.len())];
    let pattern = u64::from_le_bytes([byte; 8]);
    let mut i = 0;

    for chunk in data.chunks_exact(8) {
        let xor = load_u64(chunk) ^ pattern;
        if xor != 0 {
            return i + (xor.trailing_zeros() / 8) as usize;
        }
        i += 8;
    }

    while i < data.len() && data[i] == byte {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
