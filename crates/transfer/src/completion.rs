/// Per-block filled/unfilled bit vector with a remaining-block counter.
///
/// Filling is terminal: once a block is marked it stays marked, and marking
/// it again is a no-op. The map never touches file contents; it only records
/// which positions have been written.
#[derive(Clone, Debug)]
pub struct CompletionMap {
    bits: Vec<u64>,
    block_count: u32,
    remaining: u32,
}

impl CompletionMap {
    /// Creates a map with every block unfilled.
    #[must_use]
    pub fn new(block_count: u32) -> Self {
        let words = (block_count as usize).div_ceil(64);
        Self {
            bits: vec![0; words],
            block_count,
            remaining: block_count,
        }
    }

    /// Total number of blocks tracked.
    #[must_use]
    pub const fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Number of blocks still unfilled.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Reports whether every block is filled.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Reports whether the given block is filled.
    ///
    /// # Panics
    ///
    /// Panics if `position` is outside the tracked range.
    #[must_use]
    pub fn is_filled(&self, position: u32) -> bool {
        assert!(position < self.block_count, "block position out of range");
        self.bits[(position / 64) as usize] & (1 << (position % 64)) != 0
    }

    /// Marks the given block as filled; returns `false` if it already was.
    ///
    /// # Panics
    ///
    /// Panics if `position` is outside the tracked range.
    pub fn fill(&mut self, position: u32) -> bool {
        assert!(position < self.block_count, "block position out of range");
        let word = &mut self.bits[(position / 64) as usize];
        let mask = 1 << (position % 64);
        if *word & mask != 0 {
            return false;
        }
        *word |= mask;
        self.remaining -= 1;
        true
    }

    /// Maximal runs of consecutive unfilled blocks, ascending, as inclusive
    /// `(first_block, last_block)` pairs.
    #[must_use]
    pub fn unfilled_runs(&self) -> Vec<(u32, u32)> {
        let mut runs = Vec::new();
        let mut start = None;

        for position in 0..self.block_count {
            if self.is_filled(position) {
                if let Some(first) = start.take() {
                    runs.push((first, position - 1));
                }
            } else if start.is_none() {
                start = Some(position);
            }
        }
        if let Some(first) = start {
            runs.push((first, self.block_count - 1));
        }
        runs
    }
}
