// LZ4 block sequences driven by the match finder.
//
// A block is a series of sequences:
//   token (literal count << 4 | match length - 4)
//   [extra literal-length bytes, 255-chained]
//   literals
//   offset (u16 LE, 1..=65535)
//   [extra match-length bytes, 255-chained]
// The final sequence carries literals only. The last LAST_LITERALS bytes
// are always literals and no match starts within the last MF_LIMIT bytes,
// so blocks stay readable by standard LZ4 block decoders.

use log::trace;

use super::decoder::DecodeError;
use crate::hash::MatchFinder;
use crate::hash::config::MIN_MATCH;
use crate::hash::error::MatchError;

/// Trailing bytes always emitted as literals.
pub const LAST_LITERALS: usize = 5;

/// No match may start within this many bytes of the block end.
pub const MF_LIMIT: usize = 12;

/// Shorter blocks are emitted as a single literal run.
pub const MIN_BLOCK_INPUT: usize = MF_LIMIT + 1;

const RUN_MASK: usize = 15;

/// Worst-case size of `compress_block` output for `n` input bytes.
pub const fn max_compressed_size(n: usize) -> usize {
    n + n / 255 + 16
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Greedy-parse `input` into `out` (appended). The finder is reset first,
/// so the block never references earlier data. Returns bytes appended.
pub fn compress_block(
    finder: &mut MatchFinder,
    input: &[u8],
    out: &mut Vec<u8>,
) -> Result<usize, MatchError> {
    let start = out.len();
    let n = input.len();
    finder.init();
    out.reserve(max_compressed_size(n));

    if n < MIN_BLOCK_INPUT {
        write_last_literals(out, input);
        return Ok(out.len() - start);
    }

    let mut anchor = 0;
    let mut pos = 0;
    let mut sequences = 0usize;
    while pos + MF_LIMIT <= n {
        let max_len = n - LAST_LITERALS - pos;
        let found = finder.insert_and_find_best_match(input, pos, max_len)?;
        if found.is_none() {
            pos += 1;
            continue;
        }

        write_sequence(out, &input[anchor..pos], found.distance(pos), found.len);
        finder.insert_many(input, pos, found.len)?;
        pos += found.len;
        anchor = pos;
        sequences += 1;
    }

    write_last_literals(out, &input[anchor..]);
    trace!(
        "block: {n} -> {} bytes, {sequences} sequences",
        out.len() - start
    );
    Ok(out.len() - start)
}

fn write_length(out: &mut Vec<u8>, mut rest: usize) {
    while rest >= 255 {
        out.push(255);
        rest -= 255;
    }
    out.push(rest as u8);
}

fn write_sequence(out: &mut Vec<u8>, literals: &[u8], offset: usize, match_len: usize) {
    debug_assert!((1..=u16::MAX as usize).contains(&offset));
    debug_assert!(match_len >= MIN_MATCH);

    let lit_len = literals.len();
    let ml_code = match_len - MIN_MATCH;
    let token = (lit_len.min(RUN_MASK) << 4) | ml_code.min(RUN_MASK);
    out.push(token as u8);
    if lit_len >= RUN_MASK {
        write_length(out, lit_len - RUN_MASK);
    }
    out.extend_from_slice(literals);
    out.extend_from_slice(&(offset as u16).to_le_bytes());
    if ml_code >= RUN_MASK {
        write_length(out, ml_code - RUN_MASK);
    }
}

fn write_last_literals(out: &mut Vec<u8>, literals: &[u8]) {
    let lit_len = literals.len();
    out.push((lit_len.min(RUN_MASK) << 4) as u8);
    if lit_len >= RUN_MASK {
        write_length(out, lit_len - RUN_MASK);
    }
    out.extend_from_slice(literals);
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn read_length(src: &[u8], i: &mut usize, mut len: usize) -> Result<usize, DecodeError> {
    loop {
        let byte = *src.get(*i).ok_or(DecodeError::Truncated)?;
        *i += 1;
        len = len.saturating_add(byte as usize);
        if byte != 255 {
            return Ok(len);
        }
    }
}

/// Decode one block of `raw_len` bytes from `src`, appending to `out`.
///
/// Offsets may only reach back to the start of this block.
pub fn decompress_block(src: &[u8], raw_len: usize, out: &mut Vec<u8>) -> Result<(), DecodeError> {
    let start = out.len();
    // Each source byte expands to at most 255 output bytes.
    out.reserve(raw_len.min(src.len().saturating_mul(255)));
    let mismatch = |actual: usize| DecodeError::LengthMismatch {
        expected: raw_len as u64,
        actual: actual as u64,
    };

    let mut i = 0;
    loop {
        let token = *src.get(i).ok_or(DecodeError::Truncated)? as usize;
        i += 1;

        let mut lit_len = token >> 4;
        if lit_len == RUN_MASK {
            lit_len = read_length(src, &mut i, lit_len)?;
        }
        let literals = i
            .checked_add(lit_len)
            .and_then(|end| src.get(i..end))
            .ok_or(DecodeError::Truncated)?;
        let produced = out.len() - start;
        if produced + lit_len > raw_len {
            return Err(mismatch(produced + lit_len));
        }
        out.extend_from_slice(literals);
        i += lit_len;

        if i == src.len() {
            break;
        }

        let offset = src
            .get(i..i + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .ok_or(DecodeError::Truncated)?;
        i += 2;

        let mut match_len = token & RUN_MASK;
        if match_len == RUN_MASK {
            match_len = read_length(src, &mut i, match_len)?;
        }
        let match_len = match_len.saturating_add(MIN_MATCH);

        let produced = out.len() - start;
        if offset == 0 || offset > produced {
            return Err(DecodeError::InvalidOffset {
                offset,
                pos: produced,
            });
        }
        if produced.saturating_add(match_len) > raw_len {
            return Err(mismatch(produced.saturating_add(match_len)));
        }

        let from = out.len() - offset;
        if offset >= match_len {
            out.extend_from_within(from..from + match_len);
        } else {
            // Overlapping copy repeats the last `offset` bytes.
            for k in 0..match_len {
                let byte = out[from + k];
                out.push(byte);
            }
        }
    }

    let produced = out.len() - start;
    if produced != raw_len {
        return Err(mismatch(produced));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
