// File-level I/O helpers for frame compression.
//
// `compress_file()` / `decompress_file()` wrap the streaming encoder and
// decoder with buffered I/O; the `*_stream` variants take any reader and
// writer (the CLI uses them for stdin/stdout). Output size is counted as
// bytes flow through the writer.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::compress::decoder::{DecodeError, FrameDecoder};
use crate::compress::encoder::{CompressOptions, EncodeError, FrameEncoder};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `compress_file()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressStats {
    pub input_size: u64,
    /// Frame size in bytes.
    pub output_size: u64,
    pub blocks: u64,
}

/// Statistics returned by `decompress_file()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressStats {
    /// Frame size in bytes.
    pub input_size: u64,
    pub output_size: u64,
    pub blocks: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Compress everything `reader` yields into one frame on `writer`.
pub fn compress_stream<R: Read, W: Write>(
    mut reader: R,
    writer: W,
    opts: CompressOptions,
) -> Result<CompressStats, IoError> {
    let mut encoder = FrameEncoder::new(CountingWriter::new(writer), opts)?;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        encoder.write(&buf[..n])?;
    }
    let input_size = encoder.bytes_in();
    let (writer, blocks) = encoder.finish()?;
    Ok(CompressStats {
        input_size,
        output_size: writer.count,
        blocks,
    })
}

/// Decode one frame from `reader` onto `writer`.
pub fn decompress_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    verify: bool,
) -> Result<DecompressStats, IoError> {
    let mut decoder = FrameDecoder::with_checksum(CountingReader::new(reader), verify);
    let mut writer = writer;
    let output_size = decoder.decode_to(&mut writer)?;
    writer.flush()?;
    let blocks = decoder.blocks_decoded();
    Ok(DecompressStats {
        input_size: decoder.into_inner().count,
        output_size,
        blocks,
    })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Compress `input_path` into a frame at `output_path`.
///
/// The input is streamed through a `BufReader`, the frame written through a
/// `BufWriter`; only one block is held in memory.
pub fn compress_file(
    input_path: &Path,
    output_path: &Path,
    opts: CompressOptions,
) -> Result<CompressStats, IoError> {
    let input = BufReader::with_capacity(BUF_SIZE, File::open(input_path)?);
    let mut output = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    let stats = compress_stream(input, &mut output, opts)?;
    output.flush()?;
    Ok(stats)
}

/// Decode the frame at `input_path` into `output_path`.
pub fn decompress_file(
    input_path: &Path,
    output_path: &Path,
    verify: bool,
) -> Result<DecompressStats, IoError> {
    let input = BufReader::with_capacity(BUF_SIZE, File::open(input_path)?);
    let mut output = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    let stats = decompress_stream(input, &mut output, verify)?;
    output.flush()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Counting adapters
// ---------------------------------------------------------------------------

struct CountingWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct CountingReader<R: Read> {
    inner: R,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
