//! Deterministic segment generation
//!
//! A [`GeneratorConfig`] (seed and count) drives a [`SegmentIter`], which
//! owns its own [`RandomR`] stream and yields exactly `count` [`Segment`]s.
//! For iteration `i` one value `r` is drawn and reduced to
//! `len = r % (MAX_SEGMENT + ONE_WEIGHT)`:
//!
//! - `len >= MAX_SEGMENT` (about 7 draws in 8): a single byte, `'1'` at even
//!   `i` and `'0'` at odd `i`
//! - `len == 0`: an empty segment
//! - otherwise: `len` copies of `'2' + len`
//!
//! Nothing here performs I/O or touches shared state, so two runs with the
//! same configuration produce the same sequence on any thread.

mod query;
pub mod random;
pub mod segment;

pub use query::USAGE_MESSAGE;
pub use random::RandomR;
pub use segment::{Segment, MAX_SEGMENT, ONE_WEIGHT};

/// Result type for configuration parsing
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Invalid generator parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing query string, expected <seed>,<count>")]
    MissingArgs,

    #[error("expected ',' after the seed in {0:?}")]
    MissingComma(String),

    #[error("invalid seed: {0:?}")]
    InvalidSeed(String),

    #[error("invalid count: {0:?}")]
    InvalidCount(String),
}

/// Parameters of one generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    seed: u32,
    count: u64,
}

impl GeneratorConfig {
    /// Create a configuration from already validated values
    pub fn new(seed: u32, count: u64) -> Self {
        GeneratorConfig { seed, count }
    }

    /// Parse a `<seed>,<count>` query string
    ///
    /// Both numbers accept C integer literal syntax: `0x` hex, leading-zero
    /// octal, or decimal, with optional leading whitespace and sign. The
    /// seed wraps modulo 2^32; the count must not be negative.
    pub fn from_query(query: Option<&str>) -> Result<Self> {
        query::parse(query)
    }

    /// Seed of the random stream
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Number of segments to generate
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Start a generation run
    pub fn segments(&self) -> SegmentIter {
        SegmentIter::new(*self)
    }
}

/// Lazily generated segment sequence
///
/// Owns the random stream for the run. Iteration order is generation order.
#[derive(Debug, Clone)]
pub struct SegmentIter {
    rng: RandomR,
    index: u64,
    count: u64,
}

impl SegmentIter {
    /// Seed a new run
    pub fn new(config: GeneratorConfig) -> Self {
        SegmentIter {
            rng: RandomR::new(config.seed),
            index: 0,
            count: config.count,
        }
    }

    /// Index the next segment will have
    pub fn position(&self) -> u64 {
        self.index
    }
}

impl Iterator for SegmentIter {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.index >= self.count {
            return None;
        }

        let len = self.rng.next_value() % (MAX_SEGMENT + ONE_WEIGHT);
        let segment = Segment::classify(len, self.index);
        self.index += 1;
        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Generate the whole sequence for `(seed, count)`
pub fn generate(seed: u32, count: u64) -> Vec<Segment> {
    GeneratorConfig::new(seed, count).segments().collect()
}
