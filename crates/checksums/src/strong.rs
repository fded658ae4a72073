//! Strong checksums in the two roles the transfer needs them.
//!
//! Per-block confirmation uses MD4, truncated for storage and computed over
//! the block zero-padded to the full block width. Whole-file verification
//! uses SHA-1, streamed over the assembled output and compared against the
//! digest the control file promises. Rather than exposing generic hashers,
//! this module offers exactly those operations.

use digest::Digest;

/// MD4 digest of one target block, zero-padded to `block_size`.
///
/// The final block of a target is usually shorter than the block width; its
/// stored strong checksum is computed as if the block were padded with zero
/// bytes to `block_size`. Full blocks pass through unchanged, so the table
/// builder calls this for every block without special-casing the tail.
#[must_use]
pub fn block_digest(block: &[u8], block_size: usize) -> [u8; 16] {
    let mut hasher = md4::Md4::new();
    hasher.update(block);

    let zeros = [0u8; 64];
    let mut padding = block_size.saturating_sub(block.len());
    while padding > 0 {
        let chunk = padding.min(zeros.len());
        hasher.update(&zeros[..chunk]);
        padding -= chunk;
    }
    hasher.finalize().into()
}

/// MD4 digest of a scan window held as two ring segments, oldest bytes
/// first.
///
/// The scanner's window is a ring buffer, so a confirmed weak probe hands
/// its contents over as the wrapped pair of slices. Feeding both segments
/// into one hasher avoids materialising a contiguous copy per probe.
#[must_use]
pub fn window_digest(head: &[u8], tail: &[u8]) -> [u8; 16] {
    let mut hasher = md4::Md4::new();
    hasher.update(head);
    hasher.update(tail);
    hasher.finalize().into()
}

/// SHA-1 digest of complete target content, as recorded in the header.
#[must_use]
pub fn content_sha1(data: &[u8]) -> [u8; 20] {
    sha1::Sha1::digest(data).into()
}

/// Streaming SHA-1 check of assembled output against the header digest.
///
/// The assembler re-reads the finished file in chunks and feeds them here;
/// [`finish`](Self::finish) then settles whether the assembly produced the
/// content the control file described.
#[derive(Clone, Debug)]
pub struct ContentVerifier {
    hasher: sha1::Sha1,
    expected: [u8; 20],
}

impl ContentVerifier {
    /// Starts a verification against the given expected digest.
    #[must_use]
    pub fn new(expected: [u8; 20]) -> Self {
        Self {
            hasher: sha1::Sha1::new(),
            expected,
        }
    }

    /// Feeds the next chunk of assembled content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Settles the verification.
    ///
    /// # Errors
    ///
    /// On mismatch the error carries the digest that was actually computed,
    /// so the caller can report both sides.
    pub fn finish(self) -> Result<(), [u8; 20]> {
        let actual: [u8; 20] = self.hasher.finalize().into();
        if actual == self.expected {
            Ok(())
        } else {
            Err(actual)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_digest_is_invariant_under_the_split_point() {
        let window = b"rolling window bytes";
        let whole = window_digest(window, b"");

        for split in 0..=window.len() {
            let (head, tail) = window.split_at(split);
            assert_eq!(window_digest(head, tail), whole, "split at {split}");
        }
    }

    #[test]
    fn window_digest_matches_the_md4_reference_vector() {
        // MD4("abc") from RFC 1320.
        let expected = [
            0xa4, 0x48, 0x01, 0x7a, 0xaf, 0x21, 0xd8, 0x52, 0x5f, 0xc1, 0x0a, 0xe8, 0x7a, 0xa6,
            0x72, 0x9d,
        ];
        assert_eq!(window_digest(b"a", b"bc"), expected);
    }

    #[test]
    fn block_digest_pads_short_blocks_with_zeros() {
        let mut padded = vec![0u8; 2048];
        padded[..5].copy_from_slice(b"tail!");

        assert_eq!(block_digest(b"tail!", 2048), window_digest(&padded, b""));
    }

    #[test]
    fn block_digest_leaves_full_blocks_unpadded() {
        let block: Vec<u8> = (0u16..1024).map(|i| (i % 251) as u8).collect();

        assert_eq!(block_digest(&block, 1024), window_digest(&block, b""));
        assert_ne!(block_digest(&block, 1024), block_digest(&block, 1025));
    }

    #[test]
    fn content_sha1_matches_the_reference_vector() {
        // SHA-1("abc") from FIPS 180-1.
        let expected = [
            0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
            0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
        ];
        assert_eq!(content_sha1(b"abc"), expected);
    }

    #[test]
    fn content_verifier_accepts_matching_content_fed_in_chunks() {
        let content: Vec<u8> = (0u16..300).map(|i| (i % 256) as u8).collect();

        let mut verifier = ContentVerifier::new(content_sha1(&content));
        for chunk in content.chunks(7) {
            verifier.update(chunk);
        }
        assert!(verifier.finish().is_ok());
    }

    #[test]
    fn content_verifier_reports_the_digest_it_computed() {
        let mut verifier = ContentVerifier::new([0u8; 20]);
        verifier.update(b"not the promised content");

        let actual = verifier.finish().expect_err("digest cannot be all zero");
        assert_eq!(actual, content_sha1(b"not the promised content"));
    }
}
