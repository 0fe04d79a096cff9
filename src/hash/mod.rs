// Morphing match chain: hash-indexed, level-structured match finding.
//
// This module provides:
// - Window geometry and constants (`config`)
// - Bucket index and chain ring with biased links (`table`)
// - Per-byte run segment lists for repetitive data (`segments`)
// - The per-query level walk (`level`)
// - The MatchFinder facade with catch-up insertion (`matching`)

pub mod config;
pub mod error;
pub mod level;
pub mod matching;
pub mod scan;
pub mod segments;
pub mod table;

pub use error::MatchError;
pub use level::Match;
pub use matching::MatchFinder;
