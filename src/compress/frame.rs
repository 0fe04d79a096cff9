// Frame container for independent blocks.
//
// Layout (all integers little-endian):
//
//   magic "MMCZ" | flags u8 | block_size u32
//   { raw_len u32 | payload_len u32 | payload }*    raw_len == 0 ends
//   [adler32 u32]                                   if FLAG_CHECKSUM
//
// The high bit of payload_len marks a block stored raw.

use std::io::{self, Read, Write};

use super::block::max_compressed_size;
use super::decoder::DecodeError;

pub const MAGIC: [u8; 4] = *b"MMCZ";

/// Content checksum present after the last block.
pub const FLAG_CHECKSUM: u8 = 0x01;

/// High bit of the payload length: block stored uncompressed.
pub const STORED_BIT: u32 = 1 << 31;

pub const MIN_BLOCK_SIZE: usize = 64;
/// Hard cap on the block size a frame may declare (16 MiB).
pub const MAX_BLOCK_SIZE: usize = 1 << 24;

pub const FRAME_HEADER_LEN: usize = 9;
pub const BLOCK_HEADER_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub checksum: bool,
    pub block_size: usize,
}

impl FrameHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut buf = [0u8; FRAME_HEADER_LEN];
        buf[..4].copy_from_slice(&MAGIC);
        buf[4] = if self.checksum { FLAG_CHECKSUM } else { 0 };
        buf[5..].copy_from_slice(&(self.block_size as u32).to_le_bytes());
        w.write_all(&buf)
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let mut buf = [0u8; FRAME_HEADER_LEN];
        read_exact(r, &mut buf)?;
        if buf[..4] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let block_size = u32::from_le_bytes([buf[5], buf[6], buf[7], buf[8]]) as usize;
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(DecodeError::InvalidBlockSize { size: block_size });
        }
        Ok(Self {
            checksum: buf[4] & FLAG_CHECKSUM != 0,
            block_size,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Decoded length; 0 terminates the frame.
    pub raw_len: usize,
    pub payload_len: usize,
    pub stored: bool,
}

impl BlockHeader {
    pub const END: BlockHeader = BlockHeader {
        raw_len: 0,
        payload_len: 0,
        stored: false,
    };

    pub fn is_end(&self) -> bool {
        self.raw_len == 0
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut payload = self.payload_len as u32;
        if self.stored {
            payload |= STORED_BIT;
        }
        let mut buf = [0u8; BLOCK_HEADER_LEN];
        buf[..4].copy_from_slice(&(self.raw_len as u32).to_le_bytes());
        buf[4..].copy_from_slice(&payload.to_le_bytes());
        w.write_all(&buf)
    }

    /// Read and validate against the frame's block size.
    pub fn read_from<R: Read>(r: &mut R, block_size: usize) -> Result<Self, DecodeError> {
        let mut buf = [0u8; BLOCK_HEADER_LEN];
        read_exact(r, &mut buf)?;
        let raw_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let payload = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let header = Self {
            raw_len,
            payload_len: (payload & !STORED_BIT) as usize,
            stored: payload & STORED_BIT != 0,
        };
        if header.is_end() {
            return Ok(header);
        }

        if raw_len > block_size {
            return Err(DecodeError::BlockTooLarge {
                len: raw_len,
                max: block_size,
            });
        }
        if header.stored && header.payload_len != raw_len {
            return Err(DecodeError::LengthMismatch {
                expected: raw_len as u64,
                actual: header.payload_len as u64,
            });
        }
        let limit = max_compressed_size(raw_len);
        if header.payload_len > limit {
            return Err(DecodeError::BlockTooLarge {
                len: header.payload_len,
                max: limit,
            });
        }
        Ok(header)
    }
}

/// `read_exact` with end of input reported as a truncated frame.
pub fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), DecodeError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => DecodeError::Truncated,
        _ => DecodeError::Io(e),
    })
}

/// Read exactly `len` bytes into `buf` (replacing its contents). The buffer
/// only grows with bytes that actually arrive, so a lying length field
/// cannot force a large allocation.
pub fn read_payload<R: Read>(r: &mut R, len: usize, buf: &mut Vec<u8>) -> Result<(), DecodeError> {
    buf.clear();
    r.by_ref().take(len as u64).read_to_end(buf)?;
    if buf.len() != len {
        return Err(DecodeError::Truncated);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Content checksum
// ---------------------------------------------------------------------------

/// Streaming Adler-32 over the decoded content.
pub struct ContentChecksum {
    #[cfg(feature = "adler32")]
    inner: simd_adler32::Adler32,
    #[cfg(not(feature = "adler32"))]
    a: u32,
    #[cfg(not(feature = "adler32"))]
    b: u32,
}

impl Default for ContentChecksum {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentChecksum {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "adler32")]
            inner: simd_adler32::Adler32::new(),
            #[cfg(not(feature = "adler32"))]
            a: 1,
            #[cfg(not(feature = "adler32"))]
            b: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        #[cfg(feature = "adler32")]
        {
            self.inner.write(data);
        }
        #[cfg(not(feature = "adler32"))]
        {
            const MOD_ADLER: u32 = 65521;
            // 5552 bytes keep both sums below 2^32 between reductions.
            for chunk in data.chunks(5552) {
                for &byte in chunk {
                    self.a += u32::from(byte);
                    self.b += self.a;
                }
                self.a %= MOD_ADLER;
                self.b %= MOD_ADLER;
            }
        }
    }

    pub fn finish(&self) -> u32 {
        #[cfg(feature = "adler32")]
        {
            self.inner.finish()
        }
        #[cfg(not(feature = "adler32"))]
        {
            (self.b << 16) | self.a
        }
    }
}

/// Adler-32 of `data` in one call.
pub fn adler32(data: &[u8]) -> u32 {
    let mut checksum = ContentChecksum::new();
    checksum.update(data);
    checksum.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
