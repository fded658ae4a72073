use std::io::{self, BufReader, ErrorKind, Read};

use checksums::RollingError;
use thiserror::Error;

use crate::{BlockIndex, RollingWindow};

/// Destination for confirmed block matches.
///
/// The real implementation is the output assembler; tests substitute
/// in-memory sinks. Implementations must treat refilling an already-filled
/// position as a no-op and report it by returning `false`.
pub trait BlockSink {
    /// Writes one block's bytes at the given target position.
    ///
    /// `data` is always one full block wide; the sink truncates the write to
    /// the effective width of the target's final block. Returns `true` when
    /// the position was newly filled and `false` when it was already filled.
    fn write_block(&mut self, position: u32, data: &[u8]) -> io::Result<bool>;

    /// Reports whether the given position is already filled.
    fn is_filled(&self, position: u32) -> bool;

    /// Number of target blocks still unfilled.
    fn remaining(&self) -> u64;

    /// Reports whether every target block is filled.
    fn is_complete(&self) -> bool {
        self.remaining() == 0
    }
}

/// Errors surfaced while scanning one local input.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Reading the input or writing to the sink failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The rolling checksum rejected an update.
    #[error(transparent)]
    Rolling(#[from] RollingError),
}

/// Counters describing one completed scan.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanStats {
    /// Input bytes consumed.
    pub bytes_scanned: u64,
    /// Target blocks newly filled from this input.
    pub blocks_matched: u64,
}

/// Streaming scanner that locates target blocks inside one local input.
///
/// Advance semantics: on a probe miss the window slides exactly one byte; a
/// confirmed probe that filled at least one position discards the window and
/// refills it with one block of fresh input, so dispatched windows never
/// overlap. The scan stops at end of input or as soon as the sink reports
/// completion.
#[derive(Debug)]
pub struct MatchEngine<'a> {
    index: &'a BlockIndex,
}

impl<'a> MatchEngine<'a> {
    /// Creates a scanner over the given block index.
    #[must_use]
    pub const fn new(index: &'a BlockIndex) -> Self {
        Self { index }
    }

    /// Scans `input` to exhaustion, dispatching confirmed blocks into `sink`.
    pub fn scan<R: Read, S: BlockSink>(
        &self,
        input: R,
        sink: &mut S,
    ) -> Result<ScanStats, MatchError> {
        let block_size = self.index.block_size() as usize;
        let mut reader = BufReader::new(input);
        let mut window = RollingWindow::new(block_size);
        let mut block = vec![0u8; block_size];
        let mut scratch = vec![0u8; block_size];
        let mut stats = ScanStats::default();

        if sink.is_complete() || !read_full(&mut reader, &mut block)? {
            return Ok(stats);
        }
        stats.bytes_scanned += block_size as u64;
        window.fill(&block);

        loop {
            let filled = self.probe(&window, &mut scratch, sink, &mut stats)?;

            if filled {
                if sink.is_complete() || !read_full(&mut reader, &mut block)? {
                    break;
                }
                stats.bytes_scanned += block_size as u64;
                window.fill(&block);
                continue;
            }

            match read_one(&mut reader)? {
                Some(byte) => {
                    window.slide(byte)?;
                    stats.bytes_scanned += 1;
                }
                None => break,
            }
        }

        Ok(stats)
    }

    /// Probes the index for the current window; returns whether any target
    /// position was newly filled.
    fn probe<S: BlockSink>(
        &self,
        window: &RollingWindow,
        scratch: &mut [u8],
        sink: &mut S,
        stats: &mut ScanStats,
    ) -> Result<bool, MatchError> {
        let weak = window.weak_truncated(self.index.weak_len());
        let Some(candidates) = self.index.lookup(weak) else {
            return Ok(false);
        };

        let strong_len = self.index.strong_len();
        let digest = window.strong_digest();
        let mut filled_any = false;
        let mut copied = false;

        for candidate in candidates {
            if candidate.strong()[..strong_len] != digest[..strong_len] {
                continue;
            }

            for &position in candidate.positions() {
                if sink.is_filled(position) {
                    continue;
                }
                if !copied {
                    window.copy_to(scratch);
                    copied = true;
                }
                if sink.write_block(position, scratch)? {
                    filled_any = true;
                    stats.blocks_matched += 1;
                }
            }
        }

        Ok(filled_any)
    }
}

/// Reads until `buf` is full; returns `false` when the input ends first.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

fn read_one<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
}
