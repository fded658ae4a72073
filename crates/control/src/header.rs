use std::time::SystemTime;

use url::Url;

use crate::codec::ControlParseError;

/// Header metadata describing the transfer target.
///
/// The numeric fields drive the block geometry used by every downstream
/// component; [`block_count`](Self::block_count) and
/// [`last_block_size`](Self::last_block_size) are derived rather than stored
/// so the invariant between them and `length` cannot drift.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    /// Format version string from the `zsync` header line, when present.
    pub version: Option<String>,
    /// Name of the target file, when the producer recorded one.
    pub filename: Option<String>,
    /// Last-modified timestamp to restore on the finished target.
    pub mtime: Option<SystemTime>,
    /// Width of one target block in bytes. Always positive.
    pub block_size: u32,
    /// Total target size in bytes.
    pub length: u64,
    /// Number of consecutive matches the producer assumed when sizing the
    /// checksum widths. Advisory; the scanner confirms single blocks.
    pub sequence_matches: u8,
    /// Bytes of the rolling checksum retained per block (2 to 4).
    pub weak_len: usize,
    /// Bytes of the strong checksum retained per block (1 to 16).
    pub strong_len: usize,
    /// Location of the target's content, relative to the control file or
    /// absolute.
    pub url: String,
    /// SHA-1 digest of the complete target content.
    pub sha1: [u8; 20],
}

impl Header {
    /// Number of blocks in the target, counting the final short block.
    #[must_use]
    pub fn block_count(&self) -> u32 {
        self.length.div_ceil(u64::from(self.block_size)) as u32
    }

    /// Effective size of the final block.
    ///
    /// Zero for an empty target; otherwise `((length - 1) % block_size) + 1`,
    /// which equals `block_size` exactly when the target length is a multiple
    /// of the block size.
    #[must_use]
    pub fn last_block_size(&self) -> u32 {
        if self.length == 0 {
            0
        } else {
            (((self.length - 1) % u64::from(self.block_size)) + 1) as u32
        }
    }

    /// Resolves the data URL against the location the control file came from.
    ///
    /// Absolute URLs pass through untouched. Relative references join against
    /// `base`; when no base is available the reference cannot be resolved and
    /// the caller receives [`ControlParseError::RelativeUrl`].
    pub fn data_url(&self, base: Option<&Url>) -> Result<Url, ControlParseError> {
        match Url::parse(&self.url) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = base.ok_or_else(|| ControlParseError::RelativeUrl {
                    url: self.url.clone(),
                })?;
                base.join(&self.url)
                    .map_err(|_| ControlParseError::InvalidUrl {
                        url: self.url.clone(),
                    })
            }
            Err(_) => Err(ControlParseError::InvalidUrl {
                url: self.url.clone(),
            }),
        }
    }
}
