// Streaming frame encoder.
//
// FrameEncoder provides a streaming API for block compression:
//   - One MatchFinder is allocated up front and reset for every block
//   - Input is fed in chunks via write()
//   - Each full block is compressed and written immediately
//   - Constant memory: only one block buffered at a time

use std::io::Write;

use log::{debug, trace};

use super::block::{compress_block, max_compressed_size};
use super::frame::{
    BLOCK_HEADER_LEN, BlockHeader, ContentChecksum, FRAME_HEADER_LEN, FrameHeader, MAX_BLOCK_SIZE,
    MIN_BLOCK_SIZE,
};
use crate::hash::MatchFinder;
use crate::hash::error::MatchError;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the frame encoder.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Uncompressed bytes per block, clamped to `64 B ..= 16 MiB`.
    pub block_size: usize,
    /// Append an Adler-32 of the whole content.
    pub checksum: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            block_size: 1 << 22, // 4 MiB
            checksum: true,
        }
    }
}

impl CompressOptions {
    fn header(&self) -> FrameHeader {
        FrameHeader {
            checksum: self.checksum,
            block_size: self.block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while encoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("match finder error: {0}")]
    Match(#[from] MatchError),
}

// ---------------------------------------------------------------------------
// FrameEncoder
// ---------------------------------------------------------------------------

/// Streaming frame encoder.
///
/// # Example
/// ```
/// use morphmatch::compress::encoder::{CompressOptions, FrameEncoder};
///
/// let mut enc = FrameEncoder::new(Vec::new(), CompressOptions::default()).unwrap();
/// enc.write(b"some data, some data, some data").unwrap();
/// let (frame, blocks) = enc.finish().unwrap();
/// assert_eq!(blocks, 1);
/// assert_eq!(&frame[..4], b"MMCZ");
/// ```
pub struct FrameEncoder<W: Write> {
    writer: W,
    header: FrameHeader,
    finder: MatchFinder,
    checksum: ContentChecksum,
    header_written: bool,
    buffer: Vec<u8>,
    scratch: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
    blocks_written: u64,
}

impl<W: Write> FrameEncoder<W> {
    /// Create a new encoder. Allocates the match finder tables.
    pub fn new(writer: W, opts: CompressOptions) -> Result<Self, EncodeError> {
        let header = opts.header();
        let finder = MatchFinder::new()?;
        debug!(
            "frame encoder: block size {}, checksum {}",
            header.block_size, header.checksum
        );
        Ok(Self {
            writer,
            header,
            finder,
            checksum: ContentChecksum::new(),
            header_written: false,
            buffer: Vec::new(),
            scratch: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
            blocks_written: 0,
        })
    }

    /// Feed input to the encoder.
    ///
    /// Data is buffered internally. Whenever the buffer reaches the block
    /// size, a complete block is compressed and written to the output.
    pub fn write(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let block_size = self.header.block_size;
        self.bytes_in += data.len() as u64;
        let mut offset = 0usize;

        // Complete a partially buffered block first.
        if !self.buffer.is_empty() {
            let take = (block_size - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            offset += take;

            if self.buffer.len() == block_size {
                let block = std::mem::take(&mut self.buffer);
                self.encode_block(&block)?;
                self.buffer = block;
                self.buffer.clear();
            }
        }

        // Full blocks straight from the caller's slice.
        while offset + block_size <= data.len() {
            let end = offset + block_size;
            self.encode_block(&data[offset..end])?;
            offset = end;
        }

        if offset < data.len() {
            self.buffer.extend_from_slice(&data[offset..]);
        }
        Ok(())
    }

    /// Flush the last partial block, write the end marker and checksum.
    ///
    /// Returns the underlying writer and the number of blocks written.
    pub fn finish(mut self) -> Result<(W, u64), EncodeError> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.encode_block(&rest)?;
        }
        self.write_header()?;
        BlockHeader::END.write_to(&mut self.writer)?;
        self.bytes_out += BLOCK_HEADER_LEN as u64;
        if self.header.checksum {
            self.writer.write_all(&self.checksum.finish().to_le_bytes())?;
            self.bytes_out += 4;
        }
        self.writer.flush()?;
        debug!(
            "frame encoded: {} -> {} bytes in {} blocks",
            self.bytes_in, self.bytes_out, self.blocks_written
        );
        Ok((self.writer, self.blocks_written))
    }

    /// Input bytes received so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Frame bytes written so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    fn write_header(&mut self) -> Result<(), EncodeError> {
        if !self.header_written {
            self.header.write_to(&mut self.writer)?;
            self.bytes_out += FRAME_HEADER_LEN as u64;
            self.header_written = true;
        }
        Ok(())
    }

    fn encode_block(&mut self, block: &[u8]) -> Result<(), EncodeError> {
        self.write_header()?;
        if self.header.checksum {
            self.checksum.update(block);
        }
        self.bytes_out += write_block(&mut self.writer, &mut self.finder, block, &mut self.scratch)? as u64;
        self.blocks_written += 1;
        Ok(())
    }
}

/// Compress one block and write it with its header. Falls back to storing
/// the block raw when compression does not shrink it. Returns bytes written.
fn write_block<W: Write>(
    writer: &mut W,
    finder: &mut MatchFinder,
    block: &[u8],
    scratch: &mut Vec<u8>,
) -> Result<usize, EncodeError> {
    scratch.clear();
    compress_block(finder, block, scratch)?;
    debug_assert!(scratch.len() <= max_compressed_size(block.len()));

    let stored = scratch.len() >= block.len();
    let payload: &[u8] = if stored { block } else { scratch.as_slice() };
    trace!(
        "block of {} bytes: {} payload bytes{}",
        block.len(),
        payload.len(),
        if stored { " (stored)" } else { "" }
    );

    BlockHeader {
        raw_len: block.len(),
        payload_len: payload.len(),
        stored,
    }
    .write_to(writer)?;
    writer.write_all(payload)?;
    Ok(BLOCK_HEADER_LEN + payload.len())
}

/// Convenience: compress a whole buffer into one frame.
pub fn compress_all<W: Write>(writer: W, input: &[u8], opts: CompressOptions) -> Result<W, EncodeError> {
    let mut enc = FrameEncoder::new(writer, opts)?;
    enc.write(input)?;
    let (w, _) = enc.finish()?;
    Ok(w)
}

/// Convenience: compress a whole buffer with blocks encoded in parallel.
///
/// Blocks never reference each other, so the frame is byte-identical to
/// `compress_all` with the same options.
#[cfg(feature = "parallel")]
pub fn compress_all_parallel<W: Write>(
    mut writer: W,
    input: &[u8],
    opts: CompressOptions,
) -> Result<W, EncodeError> {
    let header = opts.header();
    let blocks: Result<Vec<Vec<u8>>, EncodeError> = input
        .par_chunks(header.block_size)
        .map_init(
            || (MatchFinder::new(), Vec::new()),
            |(finder, scratch), chunk| {
                let finder = finder.as_mut().map_err(|e| EncodeError::Match(e.clone()))?;
                let mut out = Vec::with_capacity(max_compressed_size(chunk.len()) + 8);
                write_block(&mut out, finder, chunk, scratch)?;
                Ok(out)
            },
        )
        .collect();
    let blocks = blocks?;

    header.write_to(&mut writer)?;
    for block in &blocks {
        writer.write_all(block)?;
    }
    BlockHeader::END.write_to(&mut writer)?;
    if header.checksum {
        let mut checksum = ContentChecksum::new();
        checksum.update(input);
        writer.write_all(&checksum.finish().to_le_bytes())?;
    }
    writer.flush()?;
    debug!("frame encoded in parallel: {} blocks", blocks.len());
    Ok(writer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
