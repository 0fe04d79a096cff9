// Match finder errors.
//
// No-match is not an error: it is reported as a zero-length `Match`.

/// Errors raised by the match finder.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// A table or run segment list could not be allocated or grown.
    #[error("allocation failed: {requested_bytes} bytes")]
    Allocation { requested_bytes: usize },

    /// A position before the first uninserted position was presented.
    #[error("position {pos} precedes next insertion position {next}")]
    PositionRegression { pos: usize, next: usize },

    /// A position past the end of the supplied buffer.
    #[error("position {pos} is outside the {len}-byte buffer")]
    PositionOutOfBounds { pos: usize, len: usize },

    /// The buffer cannot be addressed by 32-bit chain links.
    #[error("buffer of {len} bytes exceeds the {max}-byte addressable limit")]
    BufferTooLarge { len: usize, max: usize },
}

/// Result alias for match finder operations.
pub type Result<T> = std::result::Result<T, MatchError>;
