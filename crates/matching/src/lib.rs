#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `matching` locates reusable target blocks inside arbitrary local inputs.
//! It slides a `block_size` window across each input one byte at a time,
//! probes a prebuilt weak-checksum index, confirms candidates with the
//! truncated strong hash, and dispatches confirmed blocks to a sink.
//!
//! # Design
//!
//! - [`BlockIndex`] maps each stored weak checksum to the distinct strong
//!   checksums carrying it, each with every target position where that block
//!   occurs. Built once from a control file, then frozen.
//! - [`RollingWindow`] is a ring buffer of exactly `block_size` bytes whose
//!   weak checksum advances in O(1) per input byte.
//! - [`MatchEngine::scan`] drives the window over a reader and writes every
//!   confirmed block through the [`BlockSink`] seam, so the scanner can be
//!   exercised against an in-memory sink as easily as the real assembler.
//!
//! # Invariants
//!
//! - A weak probe alone never dispatches; the strong hash must confirm first.
//! - A confirmed window fills every still-unfilled duplicate position in one
//!   pass.
//! - On a miss the window advances exactly one byte; after a confirmed fill
//!   the scanner discards the window and refills it with fresh bytes, so two
//!   dispatched windows never overlap.
//!
//! # Examples
//!
//! Scan a seed that equals the target and observe every block dispatched.
//!
//! ```
//! use control::ControlFileBuilder;
//! use matching::{BlockIndex, BlockSink, MatchEngine};
//!
//! struct Counter(u32, u32);
//!
//! impl BlockSink for Counter {
//!     fn write_block(&mut self, _pos: u32, _data: &[u8]) -> std::io::Result<bool> {
//!         self.0 += 1;
//!         Ok(true)
//!     }
//!     fn is_filled(&self, _pos: u32) -> bool {
//!         false
//!     }
//!     fn remaining(&self) -> u64 {
//!         u64::from(self.1 - self.0)
//!     }
//! }
//!
//! let data = vec![0x2au8; 4096];
//! let control = ControlFileBuilder::new(1024, "data").build(&data);
//! let index = BlockIndex::build(&control);
//!
//! let mut sink = Counter(0, 4);
//! MatchEngine::new(&index).scan(data.as_slice(), &mut sink).unwrap();
//! assert_eq!(sink.remaining(), 0);
//! ```

mod engine;
mod index;
mod window;

pub use engine::{BlockSink, MatchEngine, MatchError, ScanStats};
pub use index::{BlockIndex, Candidates};
pub use window::RollingWindow;
