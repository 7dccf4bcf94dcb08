//! Segment descriptors

use std::fmt;

/// Exclusive upper bound on a `Filled` segment's length
pub const MAX_SEGMENT: u32 = 32;

/// Share of the draw range that produces single-byte segments
pub const ONE_WEIGHT: u32 = 256 - MAX_SEGMENT;

/// Byte written by single-byte segments at even indices
pub const EVEN_BYTE: u8 = b'1';

/// Byte written by single-byte segments at odd indices
pub const ODD_BYTE: u8 = b'0';

/// Base byte of `Filled` segments; the length is added to it
pub const FILL_BASE: u8 = b'2';

/// One unit of generated content, written as one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A single byte, alternating with the iteration parity
    SingleByte { value: u8 },
    /// No payload at all
    Empty,
    /// `length` copies of `byte`, with `1 <= length < MAX_SEGMENT`
    Filled { length: u8, byte: u8 },
}

impl Segment {
    /// Classify a draw (already reduced modulo `MAX_SEGMENT + ONE_WEIGHT`)
    /// produced at iteration `index`
    pub fn classify(len: u32, index: u64) -> Self {
        if len >= MAX_SEGMENT {
            Segment::single_byte(index)
        } else if len == 0 {
            Segment::Empty
        } else {
            // len < 32 here
            Segment::filled(len as u8)
        }
    }

    /// Single-byte segment for iteration `index`
    pub fn single_byte(index: u64) -> Self {
        let value = if index & 1 == 0 { EVEN_BYTE } else { ODD_BYTE };
        Segment::SingleByte { value }
    }

    /// Filled segment of `length` bytes, byte value derived from the length
    pub fn filled(length: u8) -> Self {
        debug_assert!(length >= 1 && u32::from(length) < MAX_SEGMENT);
        Segment::Filled {
            length,
            byte: fill_byte(length),
        }
    }

    /// Number of bytes this segment adds to the stream
    pub fn len(&self) -> usize {
        match *self {
            Segment::SingleByte { .. } => 1,
            Segment::Empty => 0,
            Segment::Filled { length, .. } => usize::from(length),
        }
    }

    /// True for `Empty`
    pub fn is_empty(&self) -> bool {
        matches!(self, Segment::Empty)
    }

    /// Write the payload into `buf` and return it as a slice
    pub fn payload<'a>(&self, buf: &'a mut [u8; MAX_SEGMENT as usize]) -> &'a [u8] {
        match *self {
            Segment::SingleByte { value } => {
                buf[0] = value;
                &buf[..1]
            }
            Segment::Empty => &buf[..0],
            Segment::Filled { length, byte } => {
                let len = usize::from(length);
                buf[..len].fill(byte);
                &buf[..len]
            }
        }
    }

    /// Short name of the variant, for logs and listings
    pub fn kind(&self) -> &'static str {
        match self {
            Segment::SingleByte { .. } => "single",
            Segment::Empty => "empty",
            Segment::Filled { .. } => "filled",
        }
    }
}

/// Byte value used by a `Filled` segment of `length` bytes
pub fn fill_byte(length: u8) -> u8 {
    FILL_BASE + length
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Segment::SingleByte { value } => write!(f, "single {:?}", value as char),
            Segment::Empty => write!(f, "empty"),
            Segment::Filled { length, byte } => {
                write!(f, "filled {} x {:?}", length, byte as char)
            }
        }
    }
}
