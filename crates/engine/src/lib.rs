#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` drives a complete differential transfer: decode the control
//! file, scan local seed inputs for reusable blocks, fetch the still-missing
//! extents over HTTP range requests, and finalise the verified target. The
//! crate also owns the progress surface ([`TransferObserver`]) and the
//! unified failure taxonomy ([`SyncError`]).
//!
//! # Design
//!
//! - [`SyncConfig`] collects everything one assembly needs: the control
//!   source, the target path, optional seed inputs, an HTTP client, and a
//!   cooperative [`CancelFlag`].
//! - [`run_sync`] executes the pipeline in order — control, local scan,
//!   remote fetch, finalise — notifying the observer of lifecycle and
//!   per-phase progress events as they occur. The pipeline is
//!   single-threaded; scan and fetch never mutate the assembler
//!   concurrently.
//! - Cancellation is observed between seed inputs, between fetch batches,
//!   and between multipart parts. Nothing is rolled back; the failure paths
//!   release every handle and remove the partial output unless a checksum
//!   mismatch retains it for diagnosis.
//!
//! # Errors
//!
//! [`SyncError`] aggregates the per-stage error types with transparent
//! conversions, so callers match on the stage taxonomies directly:
//! control decoding ([`control::ControlParseError`]), scanning
//! ([`matching::MatchError`]), assembly and fetch
//! ([`transfer::TransferError`]), and local I/O.
//!
//! # Examples
//!
//! Reconstruct a target from a local control file and one seed.
//!
//! ```no_run
//! use engine::{ControlSource, NullObserver, SyncConfig, run_sync};
//!
//! let config = SyncConfig::new(
//!     ControlSource::Path("image.iso.zsync".into()),
//!     "image.iso",
//! )
//! .seed("image-previous.iso");
//!
//! let report = run_sync(config, &mut NullObserver)?;
//! println!("fetched {} of {} bytes", report.bytes_fetched, report.length);
//! # Ok::<(), engine::SyncError>(())
//! ```

mod error;
mod observer;
mod sync;

pub use error::SyncError;
pub use observer::{NullObserver, Phase, TransferObserver};
pub use sync::{ControlSource, SyncConfig, SyncReport, run_sync};

pub use transfer::{ByteRange, CancelFlag};
