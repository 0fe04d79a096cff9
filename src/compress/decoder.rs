// Streaming frame decoder.
//
// FrameDecoder reads one block at a time:
//   - Streaming output via Write (never holds more than one block)
//   - Progress tracking (bytes decoded, blocks decoded)
//   - Optional content checksum verification at the end of the frame

use std::io::{self, Read, Write};

use log::debug;

use super::block::decompress_block;
use super::frame::{self, BlockHeader, ContentChecksum, FrameHeader};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a morphmatch frame (bad magic)")]
    BadMagic,

    #[error("frame is truncated")]
    Truncated,

    #[error("frame declares an unsupported block size of {size} bytes")]
    InvalidBlockSize { size: usize },

    #[error("offset {offset} reaches before the block start at block position {pos}")]
    InvalidOffset { offset: usize, pos: usize },

    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("block of {len} bytes exceeds the {max}-byte limit")]
    BlockTooLarge { len: usize, max: usize },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

// ---------------------------------------------------------------------------
// FrameDecoder
// ---------------------------------------------------------------------------

/// Streaming frame decoder with progress tracking.
///
/// # Example
/// ```
/// use morphmatch::compress::{decoder::FrameDecoder, encoder};
///
/// let frame = encoder::compress_all(Vec::new(), b"hello hello hello", Default::default()).unwrap();
/// let mut out = Vec::new();
/// FrameDecoder::new(frame.as_slice()).decode_to(&mut out).unwrap();
/// assert_eq!(out, b"hello hello hello");
/// ```
pub struct FrameDecoder<R: Read> {
    reader: R,
    verify: bool,
    header: Option<FrameHeader>,
    checksum: ContentChecksum,
    finished: bool,
    bytes_decoded: u64,
    blocks_decoded: u64,
    payload: Vec<u8>,
    block_buf: Vec<u8>,
}

impl<R: Read> FrameDecoder<R> {
    /// Create a decoder that verifies the content checksum when present.
    pub fn new(reader: R) -> Self {
        Self::with_checksum(reader, true)
    }

    /// Create a decoder that optionally skips checksum verification.
    pub fn with_checksum(reader: R, verify: bool) -> Self {
        Self {
            reader,
            verify,
            header: None,
            checksum: ContentChecksum::new(),
            finished: false,
            bytes_decoded: 0,
            blocks_decoded: 0,
            payload: Vec::new(),
            block_buf: Vec::new(),
        }
    }

    /// Decode all remaining blocks into `writer`. Returns the total number
    /// of bytes decoded.
    pub fn decode_to<W: Write>(&mut self, writer: &mut W) -> Result<u64, DecodeError> {
        while self.decode_block_to(writer)?.is_some() {}
        Ok(self.bytes_decoded)
    }

    /// Decode the next block into `writer`.
    ///
    /// Returns `Some(block_len)`, or `None` once the frame end (and its
    /// checksum) has been read.
    pub fn decode_block_to<W: Write>(&mut self, writer: &mut W) -> Result<Option<u64>, DecodeError> {
        if self.finished {
            return Ok(None);
        }
        let header = match self.header {
            Some(h) => h,
            None => {
                let h = FrameHeader::read_from(&mut self.reader)?;
                debug!(
                    "frame: block size {}, checksum {}",
                    h.block_size, h.checksum
                );
                self.header = Some(h);
                h
            }
        };

        let block = BlockHeader::read_from(&mut self.reader, header.block_size)?;
        if block.is_end() {
            self.finish_frame(header)?;
            return Ok(None);
        }

        frame::read_payload(&mut self.reader, block.payload_len, &mut self.payload)?;

        let decoded: &[u8] = if block.stored {
            &self.payload
        } else {
            self.block_buf.clear();
            decompress_block(&self.payload, block.raw_len, &mut self.block_buf)?;
            &self.block_buf
        };

        if header.checksum && self.verify {
            self.checksum.update(decoded);
        }
        writer.write_all(decoded)?;

        self.bytes_decoded += block.raw_len as u64;
        self.blocks_decoded += 1;
        Ok(Some(block.raw_len as u64))
    }

    fn finish_frame(&mut self, header: FrameHeader) -> Result<(), DecodeError> {
        self.finished = true;
        if header.checksum {
            let mut trailer = [0u8; 4];
            frame::read_exact(&mut self.reader, &mut trailer)?;
            let expected = u32::from_le_bytes(trailer);
            if self.verify {
                let actual = self.checksum.finish();
                if actual != expected {
                    return Err(DecodeError::ChecksumMismatch { expected, actual });
                }
            }
        }
        debug!(
            "frame decoded: {} bytes in {} blocks",
            self.bytes_decoded, self.blocks_decoded
        );
        Ok(())
    }

    /// Total bytes decoded so far.
    pub fn bytes_decoded(&self) -> u64 {
        self.bytes_decoded
    }

    /// Number of blocks decoded so far.
    pub fn blocks_decoded(&self) -> u64 {
        self.blocks_decoded
    }

    /// Recover the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Decode a whole frame held in memory.
pub fn decompress_all(frame: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = FrameDecoder::new(frame);
    let mut out = Vec::new();
    decoder.decode_to(&mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
