//! Scan accuracy tests for the matching crate.
//!
//! These tests verify that the streaming scanner finds exactly the blocks it
//! should: confirmed matches land at the correct target positions, weak
//! collisions never dispatch without strong confirmation, duplicate target
//! blocks fill from a single confirmation, and the scanner honours the
//! one-byte-on-miss / block-on-hit advance rule.

use std::io;

use control::{ControlFile, ControlFileBuilder};
use matching::{BlockIndex, BlockSink, MatchEngine};

// ============================================================================
// Test Utilities
// ============================================================================

/// In-memory sink recording every dispatched block.
struct MemorySink {
    block_size: usize,
    last_block_size: usize,
    blocks: Vec<Option<Vec<u8>>>,
}

impl MemorySink {
    fn new(control: &ControlFile) -> Self {
        let header = control.header();
        Self {
            block_size: header.block_size as usize,
            last_block_size: header.last_block_size() as usize,
            blocks: vec![None; header.block_count() as usize],
        }
    }

    fn width(&self, position: usize) -> usize {
        if position + 1 == self.blocks.len() {
            self.last_block_size
        } else {
            self.block_size
        }
    }

    fn assembled(&self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        for block in &self.blocks {
            out.extend_from_slice(block.as_deref()?);
        }
        Some(out)
    }
}

impl BlockSink for MemorySink {
    fn write_block(&mut self, position: u32, data: &[u8]) -> io::Result<bool> {
        let position = position as usize;
        if self.blocks[position].is_some() {
            return Ok(false);
        }
        let width = self.width(position);
        self.blocks[position] = Some(data[..width].to_vec());
        Ok(true)
    }

    fn is_filled(&self, position: u32) -> bool {
        self.blocks[position as usize].is_some()
    }

    fn remaining(&self) -> u64 {
        self.blocks.iter().filter(|b| b.is_none()).count() as u64
    }
}

fn scan(control: &ControlFile, seed: &[u8]) -> MemorySink {
    let index = BlockIndex::build(control);
    let mut sink = MemorySink::new(control);
    MatchEngine::new(&index)
        .scan(seed, &mut sink)
        .expect("scan succeeds");
    sink
}

/// Distinct per-block content so blocks cannot collide accidentally.
fn patterned_target(blocks: usize, block_size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(blocks * block_size);
    for block in 0..blocks {
        for i in 0..block_size {
            data.push(((block * 131 + i * 7) % 256) as u8);
        }
    }
    data
}

// ============================================================================
// Exact and Shifted Matches
// ============================================================================

/// A seed identical to the target fills every block with the right bytes.
#[test]
fn identical_seed_fills_every_block() {
    let target = patterned_target(10, 64);
    let control = ControlFileBuilder::new(64, "data").build(&target);

    let sink = scan(&control, &target);

    assert_eq!(sink.remaining(), 0);
    assert_eq!(sink.assembled().expect("all blocks filled"), target);
}

/// A seed carrying the target at a misaligned offset still matches every
/// full block, because the window slides one byte at a time.
#[test]
fn shifted_seed_matches_full_blocks() {
    let target = patterned_target(8, 4);
    let control = ControlFileBuilder::new(4, "data").build(&target);

    let mut seed = vec![0xee, 0xef, 0xf0];
    seed.extend_from_slice(&target);

    let sink = scan(&control, &seed);
    assert_eq!(sink.remaining(), 0);
    assert_eq!(sink.assembled().expect("all blocks filled"), target);
}

/// A seed sharing no block-aligned content fills nothing.
#[test]
fn disjoint_seed_matches_nothing() {
    let target = patterned_target(6, 32);
    let control = ControlFileBuilder::new(32, "data").build(&target);

    let seed: Vec<u8> = target.iter().map(|b| b.wrapping_add(97)).collect();

    let sink = scan(&control, &seed);
    assert_eq!(sink.remaining(), 6);
}

/// Inputs shorter than one block cannot prime the window and match nothing.
#[test]
fn short_input_matches_nothing() {
    let target = patterned_target(4, 16);
    let control = ControlFileBuilder::new(16, "data").build(&target);

    let sink = scan(&control, &target[..15]);
    assert_eq!(sink.remaining(), 4);
}

// ============================================================================
// Strong Confirmation
// ============================================================================

/// Two different two-byte blocks with equal second halves collide on a
/// two-byte weak checksum; the strong hash must reject the impostor.
#[test]
fn weak_collision_without_strong_confirmation_never_dispatches() {
    // For block [x, y] the second half is 2x + y: [0, 4] and [1, 2] collide.
    let target = [0u8, 4];
    let control = ControlFileBuilder::new(2, "data")
        .weak_len(2)
        .build(&target);

    let collision = scan(&control, &[1u8, 2]);
    assert_eq!(collision.remaining(), 1);

    let genuine = scan(&control, &[0u8, 4]);
    assert_eq!(genuine.remaining(), 0);
}

// ============================================================================
// Duplicates and Termination
// ============================================================================

/// One confirmed window fills every duplicate target position.
#[test]
fn duplicate_target_blocks_fill_from_one_confirmation() {
    let repeated = [0x42u8; 16];
    let unique: Vec<u8> = (0u8..16).collect();

    let mut target = Vec::new();
    target.extend_from_slice(&repeated);
    target.extend_from_slice(&repeated);
    target.extend_from_slice(&unique);
    target.extend_from_slice(&repeated);
    let control = ControlFileBuilder::new(16, "data").build(&target);

    let sink = scan(&control, &repeated);

    assert!(sink.is_filled(0));
    assert!(sink.is_filled(1));
    assert!(sink.is_filled(3));
    assert!(!sink.is_filled(2));
    assert_eq!(sink.remaining(), 1);
}

/// The scan stops as soon as the sink reports completion instead of
/// consuming the rest of the input.
#[test]
fn scan_terminates_early_once_complete() {
    let block = [0x11u8; 32];
    let target: Vec<u8> = block.repeat(2);
    let control = ControlFileBuilder::new(32, "data").build(&target);

    let index = BlockIndex::build(&control);
    let mut sink = MemorySink::new(&control);
    let seed: Vec<u8> = block.repeat(100);

    let stats = MatchEngine::new(&index)
        .scan(seed.as_slice(), &mut sink)
        .expect("scan succeeds");

    assert_eq!(sink.remaining(), 0);
    // Both duplicate positions fill from the first window.
    assert_eq!(stats.bytes_scanned, 32);
    assert_eq!(stats.blocks_matched, 2);
}

// ============================================================================
// Final Short Block
// ============================================================================

/// The final block's stored checksums cover its zero padding, so a seed only
/// matches it when the seed itself carries that padded content.
#[test]
fn final_short_block_requires_padded_content_in_the_seed() {
    let target = patterned_target(3, 4)[..10].to_vec();
    let control = ControlFileBuilder::new(4, "data").build(&target);
    assert_eq!(control.header().last_block_size(), 2);

    let bare = scan(&control, &target);
    assert!(bare.is_filled(0));
    assert!(bare.is_filled(1));
    assert!(!bare.is_filled(2));

    let mut padded_seed = target.clone();
    padded_seed.extend_from_slice(&[0, 0]);
    let padded = scan(&control, &padded_seed);
    assert_eq!(padded.remaining(), 0);

    let assembled = padded.assembled().expect("all blocks filled");
    assert_eq!(assembled, target);
}

// ============================================================================
// Reconstruction from a Mutated Seed
// ============================================================================

/// Blocks untouched by a mutation are all recovered, and every recovered
/// block carries exactly the target's bytes.
#[test]
fn mutated_seed_recovers_untouched_blocks() {
    let target = patterned_target(16, 8);
    let control = ControlFileBuilder::new(8, "data").build(&target);

    let mut seed = target.clone();
    for position in [3usize, 9, 10] {
        for byte in &mut seed[position * 8..(position + 1) * 8] {
            *byte = byte.wrapping_add(1);
        }
    }

    let sink = scan(&control, &seed);

    for position in 0..16u32 {
        let mutated = matches!(position, 3 | 9 | 10);
        assert_eq!(sink.is_filled(position), !mutated, "block {position}");
    }
    for (position, block) in sink.blocks.iter().enumerate() {
        if let Some(bytes) = block {
            assert_eq!(bytes, &target[position * 8..(position + 1) * 8]);
        }
    }
}
