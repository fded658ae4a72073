use std::io;

use thiserror::Error;

/// Unified failure taxonomy of one synchronisation run.
///
/// Every failure aborts the run; the engine never retries internally. The
/// observer receives the error through
/// [`TransferObserver::sync_failed`](crate::TransferObserver::sync_failed)
/// before it propagates to the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The control file could not be decoded or its data URL resolved.
    #[error(transparent)]
    Control(#[from] control::ControlParseError),
    /// Scanning a local seed input failed.
    #[error(transparent)]
    Match(#[from] matching::MatchError),
    /// Assembly or range fetching failed; carries the remote-missing,
    /// transport, malformed-response, incomplete-range, and
    /// checksum-mismatch cases.
    #[error(transparent)]
    Transfer(#[from] transfer::TransferError),
    /// A local file or filesystem operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Cancellation was requested at a checkpoint.
    #[error("synchronisation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Collapses the transfer stage's cancellation signal into the engine's.
    pub(crate) fn from_transfer(err: transfer::TransferError) -> Self {
        match err {
            transfer::TransferError::Cancelled => Self::Cancelled,
            other => Self::Transfer(other),
        }
    }
}
