use std::time::{Duration, SystemTime, UNIX_EPOCH};

use checksums::strong::{block_digest, content_sha1};
use checksums::{RollingChecksum, truncate_weak};

use crate::{BlockSum, ControlFile, Header};

/// Builds a control file from target content, the way the publishing side
/// does before serving the target over HTTP.
///
/// Per-block checksums are computed over each block zero-padded to the full
/// `block_size`, matching the rule the scanner relies on when its window
/// overlaps the target's short final block.
///
/// # Examples
///
/// ```
/// use control::ControlFileBuilder;
///
/// let control = ControlFileBuilder::new(2048, "dist/image.iso")
///     .filename("image.iso")
///     .build(&vec![7u8; 5000]);
///
/// assert_eq!(control.header().block_count(), 3);
/// assert_eq!(control.header().last_block_size(), 904);
/// ```
#[derive(Clone, Debug)]
pub struct ControlFileBuilder {
    block_size: u32,
    url: String,
    version: Option<String>,
    filename: Option<String>,
    mtime: Option<SystemTime>,
    sequence_matches: u8,
    weak_len: usize,
    strong_len: usize,
}

impl ControlFileBuilder {
    /// Creates a builder with full-width checksums and the given block size.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    #[must_use]
    pub fn new(block_size: u32, url: impl Into<String>) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            block_size,
            url: url.into(),
            version: None,
            filename: None,
            mtime: None,
            sequence_matches: 1,
            weak_len: 4,
            strong_len: 16,
        }
    }

    /// Records the format version emitted on the `zsync` header line.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Records the target's file name.
    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Records the target's modification time, floored to whole seconds to
    /// match the RFC 1123 representation the codec emits.
    #[must_use]
    pub fn mtime(mut self, mtime: SystemTime) -> Self {
        let floored = mtime
            .duration_since(UNIX_EPOCH)
            .map_or(UNIX_EPOCH, |since| {
                UNIX_EPOCH + Duration::from_secs(since.as_secs())
            });
        self.mtime = Some(floored);
        self
    }

    /// Sets the advisory consecutive-match count (1 or 2).
    #[must_use]
    pub fn sequence_matches(mut self, sequence_matches: u8) -> Self {
        assert!(
            (1..=2).contains(&sequence_matches),
            "sequence matches must be 1 or 2"
        );
        self.sequence_matches = sequence_matches;
        self
    }

    /// Sets the stored weak checksum width in bytes (2 to 4).
    #[must_use]
    pub fn weak_len(mut self, weak_len: usize) -> Self {
        assert!((2..=4).contains(&weak_len), "weak length must be 2 to 4");
        self.weak_len = weak_len;
        self
    }

    /// Sets the stored strong checksum width in bytes (1 to 16).
    #[must_use]
    pub fn strong_len(mut self, strong_len: usize) -> Self {
        assert!(
            (1..=16).contains(&strong_len),
            "strong length must be 1 to 16"
        );
        self.strong_len = strong_len;
        self
    }

    /// Computes the block-sum table and whole-file digest for `data`.
    #[must_use]
    pub fn build(self, data: &[u8]) -> ControlFile {
        let block_size = self.block_size as usize;
        let mut block_sums = Vec::with_capacity(data.len().div_ceil(block_size));
        let zeros = vec![0u8; block_size];

        for block in data.chunks(block_size) {
            let mut rolling = RollingChecksum::new();
            rolling.update(block);
            if block.len() < block_size {
                rolling.update(&zeros[..block_size - block.len()]);
            }

            let digest = block_digest(block, block_size);
            let mut strong = [0u8; 16];
            strong[..self.strong_len].copy_from_slice(&digest[..self.strong_len]);

            block_sums.push(BlockSum {
                weak: truncate_weak(rolling.value(), self.weak_len),
                strong,
            });
        }

        let header = Header {
            version: self.version,
            filename: self.filename,
            mtime: self.mtime,
            block_size: self.block_size,
            length: data.len() as u64,
            sequence_matches: self.sequence_matches,
            weak_len: self.weak_len,
            strong_len: self.strong_len,
            url: self.url,
            sha1: content_sha1(data),
        };

        ControlFile::from_parts(header, block_sums)
    }
}
