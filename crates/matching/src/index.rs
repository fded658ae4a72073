use control::ControlFile;
use rustc_hash::FxHashMap;

/// The distinct strong checksums observed for one weak checksum, each with
/// every target position carrying that block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidates {
    strong: [u8; 16],
    positions: Vec<u32>,
}

impl Candidates {
    /// Returns the truncated strong checksum shared by these positions.
    #[must_use]
    pub fn strong(&self) -> &[u8; 16] {
        &self.strong
    }

    /// Returns the target block indices, in ascending order.
    #[must_use]
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }
}

/// Immutable lookup structure mapping weak checksums to candidate blocks.
///
/// The outer map is keyed by the stored (truncated) weak value; the inner
/// list preserves the first-occurrence order of distinct strong checksums so
/// lookups are deterministic. Duplicate target blocks collapse into one entry
/// holding every position.
#[derive(Debug)]
pub struct BlockIndex {
    map: FxHashMap<u32, Vec<Candidates>>,
    block_size: u32,
    last_block_size: u32,
    block_count: u32,
    weak_len: usize,
    strong_len: usize,
}

impl BlockIndex {
    /// Builds the index from a parsed control file.
    #[must_use]
    pub fn build(control: &ControlFile) -> Self {
        let header = control.header();
        let mut map: FxHashMap<u32, Vec<Candidates>> = FxHashMap::default();

        for (position, sum) in control.block_sums().iter().enumerate() {
            let position = position as u32;
            let entry = map.entry(sum.weak).or_default();
            if let Some(existing) = entry.iter_mut().find(|c| c.strong == sum.strong) {
                existing.positions.push(position);
            } else {
                entry.push(Candidates {
                    strong: sum.strong,
                    positions: vec![position],
                });
            }
        }

        Self {
            map,
            block_size: header.block_size,
            last_block_size: header.last_block_size(),
            block_count: header.block_count(),
            weak_len: header.weak_len,
            strong_len: header.strong_len,
        }
    }

    /// Looks up the candidates for an already-truncated weak checksum.
    ///
    /// Callers must confirm the strong checksum before treating any returned
    /// position as a match.
    #[must_use]
    pub fn lookup(&self, weak: u32) -> Option<&[Candidates]> {
        self.map.get(&weak).map(Vec::as_slice)
    }

    /// Width of one target block in bytes.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Effective size of the final target block.
    #[must_use]
    pub const fn last_block_size(&self) -> u32 {
        self.last_block_size
    }

    /// Number of blocks in the target.
    #[must_use]
    pub const fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Stored weak checksum width in bytes.
    #[must_use]
    pub const fn weak_len(&self) -> usize {
        self.weak_len
    }

    /// Stored strong checksum width in bytes.
    #[must_use]
    pub const fn strong_len(&self) -> usize {
        self.strong_len
    }
}
