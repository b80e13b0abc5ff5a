use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive byte range, as sent in a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// `bytes=start-end`
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The range to request next when `start` bytes are already held.
///
/// Ranges end on multiples of `chunk_size`, so a transfer resumed from an
/// unaligned offset first completes the chunk it stopped in. Returns `None`
/// once `start >= total` or when `chunk_size` is zero.
pub fn next_range(start: u64, total: u64, chunk_size: u64) -> Option<ByteRange> {
    if chunk_size == 0 || start >= total {
        return None;
    }
    let index = start / chunk_size;
    let chunk_end = index.saturating_add(1).saturating_mul(chunk_size);
    Some(ByteRange::new(start, chunk_end.min(total) - 1))
}

/// All ranges from `start` to `total`.
pub fn ranges(start: u64, total: u64, chunk_size: u64) -> impl Iterator<Item = ByteRange> {
    std::iter::successors(next_range(start, total, chunk_size), move |prev| {
        next_range(prev.end + 1, total, chunk_size)
    })
}
