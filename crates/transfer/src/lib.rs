#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `transfer` owns the two data sinks of a differential transfer: the sparse
//! block-addressed output assembler and the HTTP range-fetch driver that
//! feeds it whatever the local scan could not supply.
//!
//! # Design
//!
//! - [`OutputAssembler`] writes into `<target>.part`, tracks per-block
//!   completion in a [`CompletionMap`], derives the still-missing byte
//!   extents, and finalises the file (whole-content SHA-1 check, atomic
//!   rename with a copy fallback, mtime restore). It implements
//!   [`matching::BlockSink`] so the scanner dispatches straight into it.
//! - [`RangeFetcher`] batches missing extents into `Range` requests of at
//!   most [`MAX_RANGES_PER_REQUEST`] ranges, interprets `206`/`200`/`404`
//!   responses, parses single-part and `multipart/byteranges` bodies with a
//!   deliberately lenient hand-rolled parser, and streams each delivered
//!   part into the assembler while accounting for it in a
//!   [`PendingRangeSet`].
//!
//! # Invariants
//!
//! - A filled block never changes again; refilling is a no-op.
//! - Every missing range starts on a block boundary and ends either one byte
//!   before a block boundary or at `length - 1`.
//! - A batch whose pending set is non-empty after its response is consumed
//!   fails the transfer; silent short deliveries are never tolerated.
//! - The `.part` file is removed on every failure except a checksum
//!   mismatch, where it is deliberately retained for diagnosis.
//!
//! # Errors
//!
//! [`TransferError`] carries the full failure taxonomy of the fetch and
//! assembly stages: missing remote, transport failures, malformed or
//! incomplete range responses, checksum mismatch, cancellation, and local
//! I/O.

mod assembler;
mod cancel;
mod completion;
mod error;
mod fetch;
mod range;

pub use assembler::OutputAssembler;
pub use cancel::CancelFlag;
pub use completion::CompletionMap;
pub use error::TransferError;
pub use fetch::{MAX_RANGES_PER_REQUEST, RangeFetcher};
pub use range::{ByteRange, PendingRangeSet};
