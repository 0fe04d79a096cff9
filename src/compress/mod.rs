// Block compressor built on the match finder.
//
// - `block`:   LZ4 block sequences from a greedy parse
// - `frame`:   container layout, headers and the content checksum
// - `encoder`: FrameEncoder, streaming encode one block at a time
// - `decoder`: FrameDecoder, streaming decode with progress tracking

pub mod block;
pub mod decoder;
pub mod encoder;
pub mod frame;

pub use decoder::{DecodeError, FrameDecoder, decompress_all};
pub use encoder::{CompressOptions, EncodeError, FrameEncoder, compress_all};

#[cfg(feature = "parallel")]
pub use encoder::compress_all_parallel;
