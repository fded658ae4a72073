use std::fmt;

use transfer::ByteRange;

use crate::SyncError;

/// The pipeline stages that report progress to an observer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    /// Reading a control file from the local filesystem.
    ControlRead,
    /// Downloading a control file over HTTP.
    ControlDownload,
    /// Scanning one local seed input for reusable blocks.
    InputScan,
    /// Writing assembled content into the temporary output file.
    OutputWrite,
    /// Downloading missing ranges from the data URL.
    RemoteDownload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ControlRead => "control-read",
            Self::ControlDownload => "control-download",
            Self::InputScan => "input-scan",
            Self::OutputWrite => "output-write",
            Self::RemoteDownload => "remote-download",
        };
        f.write_str(name)
    }
}

/// Progress surface for one synchronisation run.
///
/// All methods default to no-ops so observers implement only what they
/// display. Events within one phase arrive in occurrence order: a
/// [`phase_started`](Self::phase_started) always precedes any
/// [`phase_progress`](Self::phase_progress), which precede the matching
/// [`phase_complete`](Self::phase_complete). Observer latency stalls the
/// pipeline, so implementations should return quickly.
pub trait TransferObserver {
    /// The run has begun.
    fn sync_started(&mut self) {}

    /// The run finished and the target is in place.
    fn sync_complete(&mut self) {}

    /// The run aborted with the given error.
    fn sync_failed(&mut self, _error: &SyncError) {}

    /// A phase began on the named resource; `length` is the expected byte
    /// count, or zero when unknown.
    fn phase_started(&mut self, _phase: Phase, _resource: &str, _length: u64) {}

    /// A phase moved `bytes` further.
    fn phase_progress(&mut self, _phase: Phase, _bytes: u64) {}

    /// A phase finished.
    fn phase_complete(&mut self, _phase: Phase) {}

    /// The fetch stage is about to request these missing extents.
    fn ranges_requested(&mut self, _ranges: &[ByteRange]) {}
}

/// Observer that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl TransferObserver for NullObserver {}
