use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use checksums::strong::ContentVerifier;
use control::Header;
use filetime::FileTime;
use matching::BlockSink;
use tracing::debug;

use crate::{ByteRange, CompletionMap, TransferError};

const COPY_CHUNK: usize = 64 * 1024;

/// Sparse block-addressed writer assembling the target at `<target>.part`.
///
/// The assembler is the single sink for both locally matched blocks and
/// remotely fetched ranges. It records per-block completion, derives the
/// still-missing byte extents for the fetch driver, and finalises the output
/// by verifying the whole-content SHA-1, moving the temporary file over the
/// target, and restoring the recorded modification time.
///
/// On drop the temporary file is removed unless the assembly finalised
/// successfully or failed its checksum verification; in the latter case the
/// `.part` file is deliberately left behind for diagnosis.
#[derive(Debug)]
pub struct OutputAssembler {
    file: File,
    part_path: PathBuf,
    target_path: PathBuf,
    block_size: u32,
    last_block_size: u32,
    length: u64,
    expected_sha1: [u8; 20],
    mtime: Option<SystemTime>,
    completion: CompletionMap,
    finalized: bool,
    preserve_part: bool,
}

impl OutputAssembler {
    /// Opens `<target>.part` for read and write, sized to the target length.
    pub fn create(target: &Path, header: &Header) -> io::Result<Self> {
        let mut part_name = target.as_os_str().to_os_string();
        part_name.push(".part");
        let part_path = PathBuf::from(part_name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&part_path)?;
        file.set_len(header.length)?;

        Ok(Self {
            file,
            part_path,
            target_path: target.to_path_buf(),
            block_size: header.block_size,
            last_block_size: header.last_block_size(),
            length: header.length,
            expected_sha1: header.sha1,
            mtime: header.mtime,
            completion: CompletionMap::new(header.block_count()),
            finalized: false,
            preserve_part: false,
        })
    }

    /// Total target size in bytes.
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Width of one target block in bytes.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Path of the temporary output file.
    #[must_use]
    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    /// Path the finished target will occupy.
    #[must_use]
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Effective write width of the given block.
    fn block_width(&self, position: u32) -> usize {
        if position + 1 == self.completion.block_count() {
            self.last_block_size as usize
        } else {
            self.block_size as usize
        }
    }

    /// Streams a delivered byte range into the file and marks its blocks.
    ///
    /// The extent must honour the block-alignment contract: `first` on a
    /// block boundary and `last + 1` either on a block boundary or equal to
    /// the target length. Exactly `range.len()` bytes are consumed from
    /// `body`.
    pub fn receive_range<R: Read>(
        &mut self,
        range: ByteRange,
        body: &mut R,
    ) -> Result<(), TransferError> {
        let block_size = u64::from(self.block_size);
        if range.first() % block_size != 0
            || range.last() >= self.length
            || ((range.last() + 1) % block_size != 0 && range.last() + 1 != self.length)
        {
            return Err(TransferError::MalformedResponse(format!(
                "delivered range {range} is not block-aligned"
            )));
        }

        self.file.seek(SeekFrom::Start(range.first()))?;
        let mut chunk = [0u8; COPY_CHUNK];
        let mut left = range.len();
        while left > 0 {
            let want = left.min(COPY_CHUNK as u64) as usize;
            body.read_exact(&mut chunk[..want])
                .map_err(map_body_eof)?;
            self.file.write_all(&chunk[..want])?;
            left -= want as u64;
        }

        let first_block = (range.first() / block_size) as u32;
        let last_block = (range.last() / block_size) as u32;
        for position in first_block..=last_block {
            self.completion.fill(position);
        }
        Ok(())
    }

    /// Ordered, coalesced byte extents not yet covered by any filled block.
    ///
    /// Every extent starts on a block boundary; the final extent is clamped
    /// to `length - 1` rather than the full width of the last block.
    #[must_use]
    pub fn missing_ranges(&self) -> Vec<ByteRange> {
        let block_size = u64::from(self.block_size);
        self.completion
            .unfilled_runs()
            .into_iter()
            .map(|(first, last)| {
                let end = ((u64::from(last) + 1) * block_size).min(self.length) - 1;
                ByteRange::new(u64::from(first) * block_size, end)
            })
            .collect()
    }

    /// Verifies the assembled content and moves it over the target path.
    ///
    /// Re-reads the full file while computing SHA-1; on mismatch the `.part`
    /// file is retained and [`TransferError::ChecksumMismatch`] is returned.
    /// On success the temporary file is renamed over the target (falling
    /// back to a copy-and-delete replace when the rename is refused) and the
    /// recorded modification time is restored.
    pub fn finalize(mut self) -> Result<(), TransferError> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut verifier = ContentVerifier::new(self.expected_sha1);
        let mut chunk = [0u8; COPY_CHUNK];
        let mut left = self.length;
        while left > 0 {
            let want = left.min(COPY_CHUNK as u64) as usize;
            self.file.read_exact(&mut chunk[..want])?;
            verifier.update(&chunk[..want]);
            left -= want as u64;
        }

        if let Err(actual) = verifier.finish() {
            self.preserve_part = true;
            return Err(TransferError::ChecksumMismatch {
                expected: hex::encode(self.expected_sha1),
                actual: hex::encode(actual),
            });
        }

        self.file.sync_all()?;
        if let Err(rename_err) = fs::rename(&self.part_path, &self.target_path) {
            debug!(
                part = %self.part_path.display(),
                target = %self.target_path.display(),
                error = %rename_err,
                "atomic rename refused, replacing by copy"
            );
            fs::copy(&self.part_path, &self.target_path)?;
            fs::remove_file(&self.part_path)?;
        }
        self.finalized = true;

        if let Some(mtime) = self.mtime {
            filetime::set_file_mtime(&self.target_path, FileTime::from_system_time(mtime))?;
        }
        Ok(())
    }
}

impl BlockSink for OutputAssembler {
    /// Writes one block at its target offset; already-filled positions are
    /// left untouched.
    ///
    /// # Panics
    ///
    /// Panics if `data` is narrower than the block's effective width.
    fn write_block(&mut self, position: u32, data: &[u8]) -> io::Result<bool> {
        if self.completion.is_filled(position) {
            return Ok(false);
        }

        let width = self.block_width(position);
        assert!(data.len() >= width, "block data narrower than block width");

        self.file.seek(SeekFrom::Start(
            u64::from(position) * u64::from(self.block_size),
        ))?;
        self.file.write_all(&data[..width])?;
        self.completion.fill(position);
        Ok(true)
    }

    fn is_filled(&self, position: u32) -> bool {
        self.completion.is_filled(position)
    }

    fn remaining(&self) -> u64 {
        u64::from(self.completion.remaining())
    }
}

impl Drop for OutputAssembler {
    fn drop(&mut self) {
        if !self.finalized && !self.preserve_part {
            let _ = fs::remove_file(&self.part_path);
        }
    }
}

/// A body that ends before the promised range width is a protocol violation,
/// not a local I/O failure.
fn map_body_eof(err: io::Error) -> TransferError {
    if err.kind() == ErrorKind::UnexpectedEof {
        TransferError::MalformedResponse(
            "response body ended before the delivered range was complete".to_string(),
        )
    } else {
        TransferError::Io(err)
    }
}
