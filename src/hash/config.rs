// Compile-time geometry of the match finder.
//
// The window is a build-time constant carried by `MatchFinder<WINDOW_LOG>`;
// every derived size (ring length, hash bucket count) is computed from it
// here so the tables and the CLI `config` command agree on one source.

/// Minimum match length (also the hashed prefix width).
pub const MIN_MATCH: usize = 4;

/// Default window log: 64 KiB window, so every distance fits a 16-bit offset.
pub const DEFAULT_WINDOW_LOG: u32 = 16;

/// Smallest accepted window log.
pub const MIN_WINDOW_LOG: u32 = 8;

/// Largest accepted window log.
pub const MAX_WINDOW_LOG: u32 = 24;

/// Knuth's multiplicative constant (2^32 / phi).
pub const HASH_MULTIPLIER: u32 = 2_654_435_761;

/// Initial capacity of each per-byte run segment list, sentinel included.
pub const INITIAL_SEGMENT_CAPACITY: usize = 16;

/// Derived table geometry for one window log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// log2 of the window size.
    pub window_log: u32,
    /// Ring length and maximum backward distance + 1.
    pub window_size: usize,
    /// log2 of the hash bucket count.
    pub hash_log: u32,
    /// Number of hash buckets.
    pub hash_size: usize,
}

impl WindowConfig {
    /// Geometry for `window_log`. The hash table holds half as many
    /// buckets as the window has positions.
    pub const fn for_log(window_log: u32) -> Self {
        let hash_log = window_log - 1;
        Self {
            window_log,
            window_size: 1 << window_log,
            hash_log,
            hash_size: 1 << hash_log,
        }
    }

    /// Whether `window_log` lies in the supported range.
    pub const fn is_supported(window_log: u32) -> bool {
        window_log >= MIN_WINDOW_LOG && window_log <= MAX_WINDOW_LOG
    }

    /// Largest distance a returned match may have.
    pub const fn max_distance(&self) -> usize {
        self.window_size - 1
    }
}

/// Geometry of the default window.
pub const DEFAULT: WindowConfig = WindowConfig::for_log(DEFAULT_WINDOW_LOG);
