use std::fmt;

use rustc_hash::FxHashSet;

/// Inclusive byte extent `[first, last]` of the target.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    first: u64,
    last: u64,
}

impl ByteRange {
    /// Creates a range covering `first..=last`.
    ///
    /// # Panics
    ///
    /// Panics if `first > last`; an empty extent has no representation.
    #[must_use]
    pub fn new(first: u64, last: u64) -> Self {
        assert!(first <= last, "byte range must not be empty");
        Self { first, last }
    }

    /// First byte offset covered by the range.
    #[must_use]
    pub const fn first(&self) -> u64 {
        self.first
    }

    /// Last byte offset covered by the range.
    #[must_use]
    pub const fn last(&self) -> u64 {
        self.last
    }

    /// Number of bytes covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    /// Always `false`; ranges cannot be empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Tracks which requested ranges have not yet been delivered in the current
/// batch.
///
/// Parts are checked off as the response yields them; anything left over
/// after the body is consumed means the server silently dropped a requested
/// range.
#[derive(Debug, Default)]
pub struct PendingRangeSet {
    ranges: FxHashSet<ByteRange>,
}

impl PendingRangeSet {
    /// Creates the set from the ranges of one request batch.
    #[must_use]
    pub fn new(ranges: &[ByteRange]) -> Self {
        Self {
            ranges: ranges.iter().copied().collect(),
        }
    }

    /// Checks a delivered range off; returns `false` when it was never
    /// requested (or was already delivered).
    pub fn take(&mut self, range: ByteRange) -> bool {
        self.ranges.remove(&range)
    }

    /// Number of requested ranges still undelivered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Reports whether every requested range has been delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
