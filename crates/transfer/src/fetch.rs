use std::io::{self, BufRead, BufReader, Read};

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, RANGE};
use tracing::debug;
use url::Url;

use crate::{ByteRange, CancelFlag, OutputAssembler, PendingRangeSet, TransferError};

/// Upper bound on the number of ranges packed into one `Range` header.
pub const MAX_RANGES_PER_REQUEST: usize = 100;

/// What a finished batch implies for the rest of the fetch.
enum BatchOutcome {
    /// The batch delivered its ranges; continue with the next one.
    Continue,
    /// The server ignored `Range` and sent the whole file; nothing is left
    /// to request.
    WholeBodyDelivered,
}

/// Issues HTTP range requests for missing extents and streams the delivered
/// parts into the assembler.
///
/// Batches are processed sequentially; the driver never holds more than one
/// request open against the origin. Responses may arrive as a single part
/// with a `Content-Range` header, as a `multipart/byteranges` body, or as a
/// plain `200` carrying the entire file when the server ignores `Range`.
#[derive(Debug)]
pub struct RangeFetcher<'a> {
    client: &'a Client,
    url: Url,
}

impl<'a> RangeFetcher<'a> {
    /// Creates a driver fetching from the given data URL.
    #[must_use]
    pub fn new(client: &'a Client, url: Url) -> Self {
        Self { client, url }
    }

    /// The data URL this driver requests from.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches every extent in `ranges` into the assembler.
    ///
    /// `progress` observes each delivered extent's byte count in delivery
    /// order. Cancellation is honoured between batches and between multipart
    /// parts.
    pub fn fetch<F>(
        &self,
        ranges: &[ByteRange],
        assembler: &mut OutputAssembler,
        cancel: &CancelFlag,
        progress: &mut F,
    ) -> Result<(), TransferError>
    where
        F: FnMut(u64),
    {
        for batch in ranges.chunks(MAX_RANGES_PER_REQUEST) {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            match self.fetch_batch(batch, assembler, cancel, progress)? {
                BatchOutcome::Continue => {}
                BatchOutcome::WholeBodyDelivered => return Ok(()),
            }
        }
        Ok(())
    }

    fn fetch_batch<F>(
        &self,
        batch: &[ByteRange],
        assembler: &mut OutputAssembler,
        cancel: &CancelFlag,
        progress: &mut F,
    ) -> Result<BatchOutcome, TransferError>
    where
        F: FnMut(u64),
    {
        let header = range_header(batch);
        debug!(url = %self.url, ranges = batch.len(), "requesting missing ranges");

        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, header)
            .send()?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK => {
                self.deliver_whole_body(response, assembler, progress)?;
                return Ok(BatchOutcome::WholeBodyDelivered);
            }
            StatusCode::NOT_FOUND => {
                return Err(TransferError::RemoteMissing {
                    url: self.url.to_string(),
                });
            }
            status => {
                return Err(TransferError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: self.url.to_string(),
                });
            }
        }

        let mut pending = PendingRangeSet::new(batch);
        if let Some(boundary) = multipart_boundary(&response) {
            read_multipart(
                response,
                &boundary,
                &mut pending,
                assembler,
                cancel,
                progress,
            )?;
        } else {
            read_single_part(response, &mut pending, assembler, progress)?;
        }

        if pending.is_empty() {
            Ok(BatchOutcome::Continue)
        } else {
            Err(TransferError::IncompleteRangeResponse {
                missing: pending.len(),
            })
        }
    }

    /// Delivers a `200` body as the single extent covering the whole target.
    fn deliver_whole_body<F>(
        &self,
        mut response: Response,
        assembler: &mut OutputAssembler,
        progress: &mut F,
    ) -> Result<(), TransferError>
    where
        F: FnMut(u64),
    {
        debug!(url = %self.url, "server ignored Range, accepting full body");

        let length = assembler.length();
        if length == 0 {
            return Ok(());
        }
        let range = ByteRange::new(0, length - 1);
        assembler.receive_range(range, &mut (&mut response).take(length))?;
        progress(length);
        Ok(())
    }
}

/// Formats the inclusive-inclusive `Range` header for one batch.
fn range_header(batch: &[ByteRange]) -> String {
    let mut header = String::from("bytes=");
    for (i, range) in batch.iter().enumerate() {
        if i > 0 {
            header.push(',');
        }
        header.push_str(&range.to_string());
    }
    header
}

/// Extracts the boundary parameter when the response is multipart.
fn multipart_boundary(response: &Response) -> Option<String> {
    let content_type = response.headers().get(CONTENT_TYPE)?.to_str().ok()?;
    let (media_type, params) = content_type.split_once(';')?;
    if !media_type.trim().eq_ignore_ascii_case("multipart/byteranges") {
        return None;
    }

    for param in params.split(';') {
        if let Some((name, value)) = param.split_once('=')
            && name.trim().eq_ignore_ascii_case("boundary")
        {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

fn read_single_part<F>(
    mut response: Response,
    pending: &mut PendingRangeSet,
    assembler: &mut OutputAssembler,
    progress: &mut F,
) -> Result<(), TransferError>
where
    F: FnMut(u64),
{
    let value = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            TransferError::MalformedResponse(
                "single-part 206 response is missing Content-Range".to_string(),
            )
        })?;

    let range = parse_content_range(&value)?;
    if !pending.take(range) {
        return Err(TransferError::MalformedResponse(format!(
            "server delivered unrequested range {range}"
        )));
    }

    assembler.receive_range(range, &mut (&mut response).take(range.len()))?;
    progress(range.len());
    Ok(())
}

/// Streams a `multipart/byteranges` body part by part.
///
/// The parser is deliberately lenient: the opening delimiter may or may not
/// be preceded by a blank line, unrecognised part headers are ignored, and
/// anything after the closing `--boundary--` delimiter is not inspected.
/// Each part must carry exactly one `Content-Range` header naming a range
/// that was actually requested.
fn read_multipart<F>(
    response: Response,
    boundary: &str,
    pending: &mut PendingRangeSet,
    assembler: &mut OutputAssembler,
    cancel: &CancelFlag,
    progress: &mut F,
) -> Result<(), TransferError>
where
    F: FnMut(u64),
{
    let delimiter = format!("--{boundary}");
    let closing = format!("--{boundary}--");
    let mut reader = BufReader::new(response);

    loop {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let line = loop {
            let Some(line) = read_line(&mut reader)? else {
                return Err(TransferError::MalformedResponse(
                    "multipart body ended before the closing delimiter".to_string(),
                ));
            };
            if !line.is_empty() {
                break line;
            }
        };

        if line == closing.as_bytes() {
            return Ok(());
        }
        if line != delimiter.as_bytes() {
            return Err(TransferError::MalformedResponse(format!(
                "expected multipart boundary, found {:?}",
                String::from_utf8_lossy(&line)
            )));
        }

        let range = read_part_headers(&mut reader)?;
        if !pending.take(range) {
            return Err(TransferError::MalformedResponse(format!(
                "server delivered unrequested range {range}"
            )));
        }

        assembler.receive_range(range, &mut (&mut reader).take(range.len()))?;
        progress(range.len());
    }
}

/// Reads part headers up to the blank line and returns the one
/// `Content-Range` they must carry.
fn read_part_headers<R: BufRead>(reader: &mut R) -> Result<ByteRange, TransferError> {
    let mut content_range = None;

    loop {
        let Some(line) = read_line(reader)? else {
            return Err(TransferError::MalformedResponse(
                "multipart part headers ended unexpectedly".to_string(),
            ));
        };
        if line.is_empty() {
            break;
        }

        let text = String::from_utf8_lossy(&line);
        let Some((name, value)) = text.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-range") {
            if content_range.is_some() {
                return Err(TransferError::MalformedResponse(
                    "multipart part carries multiple Content-Range headers".to_string(),
                ));
            }
            content_range = Some(parse_content_range(value)?);
        }
    }

    content_range.ok_or_else(|| {
        TransferError::MalformedResponse("multipart part is missing Content-Range".to_string())
    })
}

/// Parses `bytes <first>-<last>/<total>` into an inclusive range.
///
/// A `total` that disagrees with the advertised extent is recorded but
/// tolerated; servers get this field wrong often enough that enforcing it
/// would fail working transfers.
fn parse_content_range(value: &str) -> Result<ByteRange, TransferError> {
    let malformed =
        || TransferError::MalformedResponse(format!("unparseable Content-Range {value:?}"));

    let rest = value
        .trim()
        .strip_prefix("bytes")
        .ok_or_else(malformed)?
        .trim_start();
    let (span, total) = rest.split_once('/').ok_or_else(malformed)?;
    let (first, last) = span.split_once('-').ok_or_else(malformed)?;

    let first: u64 = first.trim().parse().map_err(|_| malformed())?;
    let last: u64 = last.trim().parse().map_err(|_| malformed())?;
    if last < first {
        return Err(malformed());
    }

    if let Ok(total) = total.trim().parse::<u64>() {
        if total <= last {
            debug!(
                content_range = value,
                total, "Content-Range total disagrees with extent, tolerating"
            );
        }
    }

    Ok(ByteRange::new(first, last))
}

/// Reads one CRLF-terminated line, tolerating a bare LF; `None` at EOF.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let read = reader.read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if line.ends_with(b"\n") {
        line.pop();
    }
    if line.ends_with(b"\r") {
        line.pop();
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_header_joins_extents_with_commas() {
        let batch = [ByteRange::new(0, 99), ByteRange::new(300, 399)];
        assert_eq!(range_header(&batch), "bytes=0-99,300-399");
    }

    #[test]
    fn content_range_parses_canonical_form() {
        let range = parse_content_range("bytes 100-199/4096").expect("valid header");
        assert_eq!(range, ByteRange::new(100, 199));
    }

    #[test]
    fn content_range_tolerates_bogus_total() {
        let range = parse_content_range("bytes 100-199/50").expect("tolerated");
        assert_eq!(range, ByteRange::new(100, 199));

        let range = parse_content_range("bytes 0-9/*").expect("unknown total tolerated");
        assert_eq!(range, ByteRange::new(0, 9));
    }

    #[test]
    fn content_range_rejects_garbage() {
        for value in [
            "",
            "items 0-9/10",
            "bytes 9/10",
            "bytes a-b/10",
            "bytes 9-0/10",
            "bytes */10",
        ] {
            assert!(
                parse_content_range(value).is_err(),
                "value {value:?} should be rejected"
            );
        }
    }

    #[test]
    fn read_line_strips_crlf_and_reports_eof() {
        let mut input = io::Cursor::new(b"alpha\r\nbeta\n\r\n".to_vec());
        assert_eq!(read_line(&mut input).unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(read_line(&mut input).unwrap(), Some(b"beta".to_vec()));
        assert_eq!(read_line(&mut input).unwrap(), Some(Vec::new()));
        assert_eq!(read_line(&mut input).unwrap(), None);
    }
}
