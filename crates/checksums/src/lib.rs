#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` provides the rolling and strong checksum primitives used by the
//! differential transfer engine. The weak checksum is the Adler-style
//! two-halves sum that zsync computes over every `block_size` window of the
//! target, and the strong hashes are MD4 (per-block, truncated for storage)
//! and SHA-1 (whole-file verification).
//!
//! # Design
//!
//! The crate offers two modules:
//!
//! - [`rolling`] implements the weak checksum with an O(1) per-byte roll so a
//!   scanner can slide a window across arbitrary input without rehashing.
//! - [`strong`] offers the strong checksums in the shapes the transfer
//!   actually uses them: [`block_digest`](strong::block_digest) with the
//!   zero-padding rule for the table builder,
//!   [`window_digest`](strong::window_digest) over the scanner's ring
//!   segments, and [`ContentVerifier`](strong::ContentVerifier) for the
//!   whole-file check after assembly.
//!
//! The modules are intentionally small, allowing the workspace to enforce
//! strict layering while keeping checksum-specific rules in one place.
//!
//! # Invariants
//!
//! - [`RollingChecksum`] truncates both state halves to 16 bits after every
//!   update; the packed value is always `(b << 16) | a`.
//! - Rolling updates reject empty windows and windows longer than `u32::MAX`
//!   so the caller never observes silent state corruption.
//! - [`truncate_weak`] keeps the most-significant bytes of the packed value,
//!   matching the network-order truncation stored in control files.
//!
//! # Errors
//!
//! [`RollingError`] reports invalid rolling operations (empty windows or
//! window lengths that overflow `u32`) and implements [`std::error::Error`]
//! so the failure can be forwarded to user-facing diagnostics.
//!
//! # Examples
//!
//! Compute a weak checksum for a window and then advance it by one byte.
//!
//! ```
//! use checksums::RollingChecksum;
//!
//! let mut rolling = RollingChecksum::new();
//! rolling.update(b"abcd");
//! let before = rolling.value();
//!
//! rolling.roll(b'a', b'e').unwrap();
//! let mut fresh = RollingChecksum::new();
//! fresh.update(b"bcde");
//! assert_eq!(rolling.value(), fresh.value());
//! assert_ne!(rolling.value(), before);
//! ```

pub mod strong;

mod rolling;

pub use rolling::{RollingChecksum, RollingError, truncate_weak};
