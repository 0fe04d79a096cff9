//! Morphmatch: a Morphing Match Chain (MMC) match finder in Rust.
//!
//! The crate provides:
//! - The sliding-window match finder (`hash`)
//! - An LZ4-style block compressor and frame format built on it (`compress`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use morphmatch::MatchFinder;
//!
//! let data = b"to be or not to be";
//! let mut finder: MatchFinder = MatchFinder::new().unwrap();
//! let m = finder.insert_and_find_best_match(data, 13, 5).unwrap();
//! assert_eq!((m.len, m.pos), (5, 0));
//! ```
//!
//! Whole buffers go through the frame API:
//!
//! ```
//! use morphmatch::compress::{compress_all, decompress_all};
//!
//! let input = b"abcabcabcabcabcabcabcabc".repeat(10);
//! let frame = compress_all(Vec::new(), &input, Default::default()).unwrap();
//! assert_eq!(decompress_all(&frame).unwrap(), input);
//! ```

pub mod compress;
pub mod hash;

#[cfg(feature = "file-io")]
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use hash::{Match, MatchError, MatchFinder};
