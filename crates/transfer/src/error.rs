use std::io;

use thiserror::Error;

/// Failure taxonomy of the assembly and range-fetch stages.
///
/// The transfer never retries internally; every variant aborts the current
/// assembly and propagates to the orchestrator.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The data URL answered `404 Not Found`.
    #[error("remote resource not found: {url}")]
    RemoteMissing {
        /// The URL that was requested.
        url: String,
    },
    /// The server answered with a status the driver cannot act on.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus {
        /// The rejected status code.
        status: u16,
        /// The URL that was requested.
        url: String,
    },
    /// The HTTP client failed below the status line.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// The response body or headers could not be interpreted.
    #[error("malformed range response: {0}")]
    MalformedResponse(String),
    /// The server omitted requested ranges from its response.
    #[error("{missing} requested range(s) were not delivered in their batch")]
    IncompleteRangeResponse {
        /// Number of requested ranges never delivered.
        missing: usize,
    },
    /// The assembled file's whole-content digest disagrees with the control
    /// file. The partially assembled `.part` file is retained for diagnosis.
    #[error("assembled file SHA-1 {actual} does not match expected {expected}")]
    ChecksumMismatch {
        /// Digest recorded in the control file, lowercase hex.
        expected: String,
        /// Digest of the assembled output, lowercase hex.
        actual: String,
    },
    /// Cancellation was requested at a checkpoint.
    #[error("transfer cancelled")]
    Cancelled,
    /// A local file or filesystem operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
