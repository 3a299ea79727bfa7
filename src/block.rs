//! Block layout & header codec.
//!
//! A header is one 8-byte word whose low bit is the allocation status and
//! whose remaining bits hold the payload size (always a multiple of 8, so
//! the low bit is free for status). The explicit variant prepends two more
//! 8-byte words to every block for the free-list `prev`/`next` links; those
//! words are only meaningful while the block is free.
//!
//! Headers are encoded/decoded as fixed 8-byte little-endian words rather
//! than native `usize`, so block layout does not change shape between 32-
//! and 64-bit targets.

/// Size of a single header word, in bytes.
pub const WORD: usize = 8;

/// Total header size for the implicit variant (one word: status|payload).
pub const IMPLICIT_HEADER_SIZE: usize = WORD;

/// Total header size for the explicit variant (status|payload, prev, next).
pub const EXPLICIT_HEADER_SIZE: usize = WORD * 3;

/// Sentinel word meaning "no link" for an encoded `prev`/`next` field.
const NO_LINK: u64 = u64::MAX;

/// A single packed `(payload, status)` header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    word: u64,
}

impl Header {
    /// Builds a header for a block with the given payload size and
    /// allocation status. `payload` must already be a multiple of 8.
    pub fn new(payload: usize, allocated: bool) -> Self {
        debug_assert_eq!(payload % 8, 0, "payload must be 8-byte aligned");
        Self {
            word: (payload as u64) | (allocated as u64),
        }
    }

    /// The payload size encoded in this header.
    pub fn payload(&self) -> usize {
        (self.word & !1) as usize
    }

    /// Whether this block is currently allocated.
    pub fn is_allocated(&self) -> bool {
        self.word & 1 == 1
    }

    /// Returns an equivalent header with the allocation status explicitly
    /// set, leaving the payload untouched. Per the design note in the
    /// original source, status is always set/cleared explicitly rather than
    /// toggled with XOR, so no caller needs to track the prior state.
    pub fn with_allocated(self, allocated: bool) -> Self {
        Self::new(self.payload(), allocated)
    }

    pub fn to_bytes(self) -> [u8; WORD] {
        self.word.to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; WORD]) -> Self {
        Self {
            word: u64::from_le_bytes(bytes),
        }
    }
}

/// Encodes an optional region offset as a free-list link word.
pub fn encode_link(offset: Option<usize>) -> [u8; WORD] {
    let word = match offset {
        Some(offset) => offset as u64,
        None => NO_LINK,
    };
    word.to_le_bytes()
}

/// Decodes a free-list link word back into an optional region offset.
pub fn decode_link(bytes: [u8; WORD]) -> Option<usize> {
    match u64::from_le_bytes(bytes) {
        NO_LINK => None,
        word => Some(word as usize),
    }
}
