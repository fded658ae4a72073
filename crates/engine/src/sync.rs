use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use control::ControlFile;
use matching::{BlockIndex, BlockSink, MatchEngine};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::debug;
use transfer::{ByteRange, CancelFlag, OutputAssembler, RangeFetcher, TransferError};
use url::Url;

use crate::{Phase, SyncError, TransferObserver};

/// Where the control file comes from.
#[derive(Clone, Debug)]
pub enum ControlSource {
    /// A control file on the local filesystem.
    Path(PathBuf),
    /// A control file fetched over HTTP. Doubles as the base for resolving a
    /// relative data URL.
    Url(Url),
}

/// Everything one synchronisation run needs.
///
/// The target path itself, when it exists, is always scanned as the first
/// seed input; [`seed`](Self::seed) adds further local candidates.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    control: ControlSource,
    target: PathBuf,
    seeds: Vec<PathBuf>,
    client: Option<Client>,
    cancel: CancelFlag,
}

impl SyncConfig {
    /// Creates a configuration reconstructing `target` from `control`.
    #[must_use]
    pub fn new(control: ControlSource, target: impl Into<PathBuf>) -> Self {
        Self {
            control,
            target: target.into(),
            seeds: Vec::new(),
            client: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Adds a local candidate input to scan for reusable blocks.
    #[must_use]
    pub fn seed(mut self, seed: impl Into<PathBuf>) -> Self {
        self.seeds.push(seed.into());
        self
    }

    /// Supplies the HTTP client to use instead of a default one.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Shares a cancellation flag with the caller.
    #[must_use]
    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Byte accounting for one completed run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncReport {
    /// Total target size in bytes.
    pub length: u64,
    /// Bytes of the target satisfied from local inputs.
    pub bytes_reused: u64,
    /// Bytes delivered over HTTP range requests.
    pub bytes_fetched: u64,
    /// Target blocks filled by the local scan.
    pub blocks_matched: u64,
}

/// Runs the full pipeline: control, local scan, remote fetch, finalise.
///
/// The observer receives `sync_started` first and exactly one of
/// `sync_complete` or `sync_failed` last, with per-phase events in
/// occurrence order in between.
pub fn run_sync(
    config: SyncConfig,
    observer: &mut dyn TransferObserver,
) -> Result<SyncReport, SyncError> {
    observer.sync_started();
    let result = drive(&config, observer);
    match &result {
        Ok(report) => {
            debug!(
                reused = report.bytes_reused,
                fetched = report.bytes_fetched,
                "synchronisation complete"
            );
            observer.sync_complete();
        }
        Err(error) => observer.sync_failed(error),
    }
    result
}

fn drive(
    config: &SyncConfig,
    observer: &mut dyn TransferObserver,
) -> Result<SyncReport, SyncError> {
    let client = config.client.clone().unwrap_or_default();

    let (control, base) = load_control(&client, &config.control, observer)?;
    let header = control.header();
    let data_url = header.data_url(base.as_ref())?;
    let length = header.length;

    let mut assembler = OutputAssembler::create(&config.target, header)?;
    observer.phase_started(
        Phase::OutputWrite,
        &config.target.display().to_string(),
        length,
    );
    let mut written_seen = 0;

    let mut report = SyncReport {
        length,
        ..SyncReport::default()
    };

    if !assembler.is_complete() {
        let index = BlockIndex::build(&control);
        let scanner = MatchEngine::new(&index);

        let mut candidates = Vec::new();
        if config.target.exists() {
            candidates.push(config.target.clone());
        }
        candidates.extend(config.seeds.iter().cloned());

        for seed in &candidates {
            if config.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            if assembler.is_complete() {
                break;
            }

            let file = File::open(seed)?;
            let seed_len = file.metadata()?.len();
            observer.phase_started(Phase::InputScan, &seed.display().to_string(), seed_len);

            let reader = ObservedReader {
                inner: file,
                observer: &mut *observer,
                phase: Phase::InputScan,
            };
            let stats = scanner.scan(reader, &mut assembler)?;
            observer.phase_complete(Phase::InputScan);

            debug!(
                seed = %seed.display(),
                blocks = stats.blocks_matched,
                bytes = stats.bytes_scanned,
                "seed scan finished"
            );
            report.blocks_matched += stats.blocks_matched;
            emit_written(observer, &assembler, length, &mut written_seen);
        }
    }

    report.bytes_reused = length - outstanding_bytes(&assembler);

    if !assembler.is_complete() {
        let missing = assembler.missing_ranges();
        let missing_bytes: u64 = missing.iter().map(ByteRange::len).sum();
        observer.ranges_requested(&missing);
        observer.phase_started(Phase::RemoteDownload, data_url.as_str(), missing_bytes);

        let fetcher = RangeFetcher::new(&client, data_url);
        let mut fetched = 0u64;
        let mut on_delivery = |bytes: u64| {
            fetched += bytes;
            observer.phase_progress(Phase::RemoteDownload, bytes);
            observer.phase_progress(Phase::OutputWrite, bytes);
        };
        fetcher
            .fetch(&missing, &mut assembler, &config.cancel, &mut on_delivery)
            .map_err(SyncError::from_transfer)?;

        observer.phase_complete(Phase::RemoteDownload);
        report.bytes_fetched = fetched;
    }

    assembler.finalize().map_err(SyncError::from_transfer)?;
    observer.phase_complete(Phase::OutputWrite);
    Ok(report)
}

/// Bytes of the target not yet covered by a filled block.
fn outstanding_bytes(assembler: &OutputAssembler) -> u64 {
    assembler.missing_ranges().iter().map(ByteRange::len).sum()
}

/// Reports output-file progress as the delta of bytes filled since the last
/// emission.
fn emit_written(
    observer: &mut dyn TransferObserver,
    assembler: &OutputAssembler,
    length: u64,
    written_seen: &mut u64,
) {
    let written = length - outstanding_bytes(assembler);
    if written > *written_seen {
        observer.phase_progress(Phase::OutputWrite, written - *written_seen);
        *written_seen = written;
    }
}

fn load_control(
    client: &Client,
    source: &ControlSource,
    observer: &mut dyn TransferObserver,
) -> Result<(ControlFile, Option<Url>), SyncError> {
    match source {
        ControlSource::Path(path) => {
            let file = File::open(path)?;
            let len = file.metadata()?.len();
            observer.phase_started(Phase::ControlRead, &path.display().to_string(), len);

            let control = ControlFile::parse(ObservedReader {
                inner: file,
                observer: &mut *observer,
                phase: Phase::ControlRead,
            })?;
            observer.phase_complete(Phase::ControlRead);
            Ok((control, None))
        }
        ControlSource::Url(url) => {
            let response = client
                .get(url.clone())
                .send()
                .map_err(TransferError::from)?;
            match response.status() {
                StatusCode::OK => {}
                StatusCode::NOT_FOUND => {
                    return Err(TransferError::RemoteMissing {
                        url: url.to_string(),
                    }
                    .into());
                }
                status => {
                    return Err(TransferError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    }
                    .into());
                }
            }

            let len = response.content_length().unwrap_or(0);
            observer.phase_started(Phase::ControlDownload, url.as_str(), len);

            let control = ControlFile::parse(ObservedReader {
                inner: response,
                observer: &mut *observer,
                phase: Phase::ControlDownload,
            })?;
            observer.phase_complete(Phase::ControlDownload);
            Ok((control, Some(url.clone())))
        }
    }
}

/// Forwards read progress of the wrapped stream to the observer.
struct ObservedReader<'a, R> {
    inner: R,
    observer: &'a mut dyn TransferObserver,
    phase: Phase,
}

impl<R: Read> Read for ObservedReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read > 0 {
            self.observer.phase_progress(self.phase, read as u64);
        }
        Ok(read)
    }
}
