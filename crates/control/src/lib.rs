#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `control` models the metadata file that describes a transfer target: a
//! textual header (block size, target length, hash widths, data URL,
//! whole-file SHA-1, modification time) followed by a binary table holding a
//! truncated weak and strong checksum for every target block.
//!
//! # Design
//!
//! - [`Header`] carries the parsed header fields plus the derived block
//!   geometry (`block_count`, `last_block_size`).
//! - [`BlockSum`] is one row of the binary table; [`ControlFile`] aggregates
//!   the header with the ordered table and is immutable once constructed.
//! - [`ControlFile::parse`] decodes a byte stream, [`ControlFile::encode`]
//!   is its byte-exact inverse, and [`ControlFileBuilder`] produces a control
//!   file from target content the way the publishing side does.
//!
//! # Invariants
//!
//! - `block_count == length.div_ceil(block_size)` and the block-sum table
//!   always holds exactly `block_count` entries.
//! - Stored weak checksums keep only their `weak_len` most-significant bytes;
//!   stored strong checksums keep only their leading `strong_len` bytes. The
//!   insignificant tail of every [`BlockSum`] is zero.
//! - The final block's strong checksum is computed over the block zero-padded
//!   to the full `block_size`.
//!
//! # Errors
//!
//! [`ControlParseError`] covers missing or malformed header fields, truncated
//! block tables, and data-URL resolution failures.
//!
//! # Examples
//!
//! Build a control file for a small target and round-trip it through the
//! codec.
//!
//! ```
//! use control::{ControlFile, ControlFileBuilder};
//!
//! let data = b"example target content".repeat(64);
//! let control = ControlFileBuilder::new(1024, "data/example.bin")
//!     .weak_len(3)
//!     .strong_len(5)
//!     .build(&data);
//!
//! let mut encoded = Vec::new();
//! control.encode(&mut encoded).unwrap();
//! let decoded = ControlFile::parse(encoded.as_slice()).unwrap();
//! assert_eq!(decoded, control);
//! ```

mod build;
mod codec;
mod header;

pub use build::ControlFileBuilder;
pub use codec::ControlParseError;
pub use header::Header;

/// One row of the block-sum table: the truncated weak and strong checksum of
/// a single target block.
///
/// Only the `weak_len` most-significant bytes of [`weak`](Self::weak) and the
/// leading `strong_len` bytes of [`strong`](Self::strong) are significant;
/// the remainder is zero so derived equality compares exactly the stored
/// truncations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BlockSum {
    /// Packed weak checksum, truncated to the header's `weak_len`.
    pub weak: u32,
    /// Strong block checksum, truncated to the header's `strong_len`.
    pub strong: [u8; 16],
}

impl BlockSum {
    /// Returns the significant prefix of the strong checksum.
    #[must_use]
    pub fn strong_prefix(&self, strong_len: usize) -> &[u8] {
        &self.strong[..strong_len.min(16)]
    }
}

/// A parsed control file: header metadata plus the ordered block-sum table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlFile {
    header: Header,
    block_sums: Vec<BlockSum>,
}

impl ControlFile {
    /// Assembles a control file from its parts.
    ///
    /// The table length must match the header's derived block count; this is
    /// upheld by both the parser and the builder.
    #[must_use]
    pub(crate) fn from_parts(header: Header, block_sums: Vec<BlockSum>) -> Self {
        debug_assert_eq!(block_sums.len() as u64, u64::from(header.block_count()));
        Self { header, block_sums }
    }

    /// Returns the header metadata.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the block-sum table in target order.
    #[must_use]
    pub fn block_sums(&self) -> &[BlockSum] {
        &self.block_sums
    }
}
