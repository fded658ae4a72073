use std::io::{self, BufRead, BufReader, Read, Write};

use thiserror::Error;

use crate::{BlockSum, ControlFile, Header};

/// Errors produced while decoding a control file.
#[derive(Debug, Error)]
pub enum ControlParseError {
    /// A required header key was absent.
    #[error("control header is missing required key {key:?}")]
    MissingKey {
        /// Name of the absent key.
        key: &'static str,
    },
    /// A header field carried a value that could not be interpreted.
    #[error("control header field {key:?} has invalid value {value:?}")]
    InvalidValue {
        /// Name of the offending key.
        key: &'static str,
        /// The rejected value as it appeared in the header.
        value: String,
    },
    /// The `Hash-Lengths` triple was malformed or out of range.
    #[error("Hash-Lengths value {value:?} is outside the supported range")]
    InvalidHashLengths {
        /// The rejected value as it appeared in the header.
        value: String,
    },
    /// The byte stream ended before the blank line terminating the header.
    #[error("control header ended before the blank separator line")]
    TruncatedHeader,
    /// The block-sum table held fewer entries than the header requires.
    #[error("block-sum table ended after {read} of {expected} entries")]
    TruncatedBlockTable {
        /// Entries the header geometry demands.
        expected: u32,
        /// Entries actually present.
        read: u32,
    },
    /// The data URL is relative and no base location is known.
    #[error("data URL {url:?} is relative and no base was provided")]
    RelativeUrl {
        /// The unresolvable reference.
        url: String,
    },
    /// The data URL could not be parsed at all.
    #[error("data URL {url:?} could not be parsed")]
    InvalidUrl {
        /// The rejected reference.
        url: String,
    },
    /// Reading the underlying stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn numeric<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ControlParseError> {
    value.parse().map_err(|_| ControlParseError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_hash_lengths(value: &str) -> Result<(u8, usize, usize), ControlParseError> {
    let invalid = || ControlParseError::InvalidHashLengths {
        value: value.to_string(),
    };

    let mut parts = value.split(',');
    let seq: u8 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(invalid)?;
    let weak: usize = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(invalid)?;
    let strong: usize = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(invalid)?;

    if parts.next().is_some()
        || !(1..=2).contains(&seq)
        || !(2..=4).contains(&weak)
        || !(1..=16).contains(&strong)
    {
        return Err(invalid());
    }

    Ok((seq, weak, strong))
}

fn parse_sha1(value: &str) -> Result<[u8; 20], ControlParseError> {
    let invalid = || ControlParseError::InvalidValue {
        key: "SHA-1",
        value: value.to_string(),
    };

    let bytes = hex::decode(value.trim()).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

/// Accumulates header fields as lines arrive, in whatever order they appear.
#[derive(Default)]
struct HeaderFields {
    version: Option<String>,
    filename: Option<String>,
    mtime: Option<std::time::SystemTime>,
    block_size: Option<u32>,
    length: Option<u64>,
    hash_lengths: Option<(u8, usize, usize)>,
    url: Option<String>,
    sha1: Option<[u8; 20]>,
}

impl HeaderFields {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), ControlParseError> {
        match key {
            "zsync" => self.version = Some(value.to_string()),
            "Filename" => self.filename = Some(value.to_string()),
            "MTime" => {
                let parsed = httpdate::parse_http_date(value).map_err(|_| {
                    ControlParseError::InvalidValue {
                        key: "MTime",
                        value: value.to_string(),
                    }
                })?;
                self.mtime = Some(parsed);
            }
            "Blocksize" => {
                let block_size: u32 = numeric("Blocksize", value)?;
                if block_size == 0 {
                    return Err(ControlParseError::InvalidValue {
                        key: "Blocksize",
                        value: value.to_string(),
                    });
                }
                self.block_size = Some(block_size);
            }
            "Length" => self.length = Some(numeric("Length", value)?),
            "Hash-Lengths" => self.hash_lengths = Some(parse_hash_lengths(value)?),
            "URL" => self.url = Some(value.to_string()),
            "SHA-1" => self.sha1 = Some(parse_sha1(value)?),
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<Header, ControlParseError> {
        let missing = |key| ControlParseError::MissingKey { key };

        let block_size = self.block_size.ok_or_else(|| missing("Blocksize"))?;
        let length = self.length.ok_or_else(|| missing("Length"))?;
        let (sequence_matches, weak_len, strong_len) =
            self.hash_lengths.ok_or_else(|| missing("Hash-Lengths"))?;
        let url = self.url.ok_or_else(|| missing("URL"))?;
        let sha1 = self.sha1.ok_or_else(|| missing("SHA-1"))?;

        if length.div_ceil(u64::from(block_size)) > u64::from(u32::MAX) {
            return Err(ControlParseError::InvalidValue {
                key: "Length",
                value: length.to_string(),
            });
        }

        Ok(Header {
            version: self.version,
            filename: self.filename,
            mtime: self.mtime,
            block_size,
            length,
            sequence_matches,
            weak_len,
            strong_len,
            url,
            sha1,
        })
    }
}

impl ControlFile {
    /// Decodes a control file from a byte stream.
    ///
    /// The textual header is read line by line until the blank separator,
    /// unknown keys are ignored, and exactly
    /// `block_count × (weak_len + strong_len)` bytes of block-sum table
    /// follow. Stored weak checksums occupy the most-significant bytes of
    /// their 32-bit value; stored strong checksums occupy the leading bytes
    /// of the 16-byte field, with the remainder zeroed.
    pub fn parse<R: Read>(reader: R) -> Result<Self, ControlParseError> {
        let mut reader = BufReader::new(reader);
        let mut fields = HeaderFields::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 || !line.ends_with(b"\n") {
                return Err(ControlParseError::TruncatedHeader);
            }

            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
            if line.is_empty() {
                break;
            }

            let text = String::from_utf8_lossy(&line);
            if let Some((key, value)) = text.split_once(':') {
                fields.apply(key, value.trim_start_matches(' '))?;
            }
        }

        let header = fields.finish()?;
        let block_sums = read_block_sums(&mut reader, &header)?;
        Ok(Self::from_parts(header, block_sums))
    }

    /// Encodes the control file as the byte-exact inverse of [`parse`](Self::parse).
    pub fn encode<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let header = self.header();

        if let Some(version) = &header.version {
            writeln!(writer, "zsync: {version}")?;
        }
        if let Some(filename) = &header.filename {
            writeln!(writer, "Filename: {filename}")?;
        }
        if let Some(mtime) = header.mtime {
            writeln!(writer, "MTime: {}", httpdate::fmt_http_date(mtime))?;
        }
        writeln!(writer, "Blocksize: {}", header.block_size)?;
        writeln!(writer, "Length: {}", header.length)?;
        writeln!(
            writer,
            "Hash-Lengths: {},{},{}",
            header.sequence_matches, header.weak_len, header.strong_len
        )?;
        writeln!(writer, "URL: {}", header.url)?;
        writeln!(writer, "SHA-1: {}", hex::encode(header.sha1))?;
        writeln!(writer)?;

        for sum in self.block_sums() {
            writer.write_all(&sum.weak.to_be_bytes()[..header.weak_len])?;
            writer.write_all(&sum.strong[..header.strong_len])?;
        }
        Ok(())
    }
}

fn read_block_sums<R: BufRead>(
    reader: &mut R,
    header: &Header,
) -> Result<Vec<BlockSum>, ControlParseError> {
    let expected = header.block_count();
    let entry_len = header.weak_len + header.strong_len;
    let mut entry = vec![0u8; entry_len];
    let mut block_sums = Vec::with_capacity(expected as usize);

    for read in 0..expected {
        if let Err(err) = reader.read_exact(&mut entry) {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                return Err(ControlParseError::TruncatedBlockTable { expected, read });
            }
            return Err(err.into());
        }

        let mut weak_be = [0u8; 4];
        weak_be[..header.weak_len].copy_from_slice(&entry[..header.weak_len]);
        let mut strong = [0u8; 16];
        strong[..header.strong_len].copy_from_slice(&entry[header.weak_len..]);

        block_sums.push(BlockSum {
            weak: u32::from_be_bytes(weak_be),
            strong,
        });
    }

    Ok(block_sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControlFileBuilder;

    fn sample_header_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"zsync: 0.6.2\n");
        bytes.extend_from_slice(b"Filename: example.bin\n");
        bytes.extend_from_slice(b"MTime: Sat, 19 Jul 2025 10:30:00 GMT\n");
        bytes.extend_from_slice(b"Blocksize: 4\n");
        bytes.extend_from_slice(b"Length: 7\n");
        bytes.extend_from_slice(b"Hash-Lengths: 1,2,3\n");
        bytes.extend_from_slice(b"URL: example.bin\n");
        bytes.extend_from_slice(b"SHA-1: ");
        bytes.extend_from_slice(hex::encode([0x5a; 20]).as_bytes());
        bytes.extend_from_slice(b"\n\n");
        bytes
    }

    #[test]
    fn parses_header_and_block_table() {
        let mut bytes = sample_header_bytes();
        // Two entries of weak_len 2 + strong_len 3.
        bytes.extend_from_slice(&[0xab, 0xcd, 1, 2, 3]);
        bytes.extend_from_slice(&[0x12, 0x34, 4, 5, 6]);

        let control = ControlFile::parse(bytes.as_slice()).expect("well-formed control file");
        let header = control.header();

        assert_eq!(header.version.as_deref(), Some("0.6.2"));
        assert_eq!(header.filename.as_deref(), Some("example.bin"));
        assert!(header.mtime.is_some());
        assert_eq!(header.block_size, 4);
        assert_eq!(header.length, 7);
        assert_eq!(header.sequence_matches, 1);
        assert_eq!(header.weak_len, 2);
        assert_eq!(header.strong_len, 3);
        assert_eq!(header.sha1, [0x5a; 20]);
        assert_eq!(header.block_count(), 2);
        assert_eq!(header.last_block_size(), 3);

        let sums = control.block_sums();
        assert_eq!(sums.len(), 2);
        assert_eq!(sums[0].weak, 0xabcd_0000);
        assert_eq!(&sums[0].strong[..3], &[1, 2, 3]);
        assert_eq!(&sums[0].strong[3..], &[0u8; 13]);
        assert_eq!(sums[1].weak, 0x1234_0000);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"X-Experimental: yes\n");
        bytes.extend_from_slice(b"Blocksize: 2\n");
        bytes.extend_from_slice(b"Length: 2\n");
        bytes.extend_from_slice(b"Hash-Lengths: 1,4,16\n");
        bytes.extend_from_slice(b"URL: http://mirror.example/data\n");
        bytes.extend_from_slice(b"SHA-1: ");
        bytes.extend_from_slice(hex::encode([0; 20]).as_bytes());
        bytes.extend_from_slice(b"\n\n");
        bytes.extend_from_slice(&[0u8; 20]);

        let control = ControlFile::parse(bytes.as_slice()).expect("unknown keys tolerated");
        assert_eq!(control.block_sums().len(), 1);
    }

    #[test]
    fn sha1_accepts_uppercase_hex() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"Blocksize: 2\n");
        bytes.extend_from_slice(b"Length: 0\n");
        bytes.extend_from_slice(b"Hash-Lengths: 1,4,16\n");
        bytes.extend_from_slice(b"URL: data\n");
        bytes.extend_from_slice(b"SHA-1: ");
        bytes.extend_from_slice(hex::encode_upper([0xfe; 20]).as_bytes());
        bytes.extend_from_slice(b"\n\n");

        let control = ControlFile::parse(bytes.as_slice()).expect("uppercase digest accepted");
        assert_eq!(control.header().sha1, [0xfe; 20]);
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"Blocksize: 2\n");
        bytes.extend_from_slice(b"Length: 2\n");
        bytes.extend_from_slice(b"URL: data\n");
        bytes.extend_from_slice(b"SHA-1: ");
        bytes.extend_from_slice(hex::encode([0; 20]).as_bytes());
        bytes.extend_from_slice(b"\n\n");

        let err = ControlFile::parse(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ControlParseError::MissingKey {
                key: "Hash-Lengths"
            }
        ));
    }

    #[test]
    fn non_numeric_length_is_rejected() {
        let bytes = b"Blocksize: 2\nLength: soon\n";
        let err = ControlFile::parse(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ControlParseError::InvalidValue { key: "Length", .. }
        ));
    }

    #[test]
    fn zero_blocksize_is_rejected() {
        let bytes = b"Blocksize: 0\n";
        let err = ControlFile::parse(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ControlParseError::InvalidValue {
                key: "Blocksize",
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_hash_lengths_are_rejected() {
        for value in ["3,4,16", "1,5,16", "1,4,17", "1,4", "1,4,16,2", "a,b,c"] {
            let line = format!("Hash-Lengths: {value}\n");
            let err = ControlFile::parse(line.as_bytes()).unwrap_err();
            assert!(
                matches!(err, ControlParseError::InvalidHashLengths { .. }),
                "value {value:?} should be rejected"
            );
        }
    }

    #[test]
    fn truncated_block_table_is_rejected() {
        let mut bytes = sample_header_bytes();
        bytes.extend_from_slice(&[0xab, 0xcd, 1, 2, 3]);
        // Second entry cut short.
        bytes.extend_from_slice(&[0x12, 0x34]);

        let err = ControlFile::parse(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            ControlParseError::TruncatedBlockTable {
                expected: 2,
                read: 1
            }
        ));
    }

    #[test]
    fn header_without_blank_line_is_rejected() {
        let bytes = b"Blocksize: 2\nLength: 2\n";
        let err = ControlFile::parse(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, ControlParseError::TruncatedHeader));
    }

    #[test]
    fn encode_then_parse_is_identity() {
        let data: Vec<u8> = (0u32..3000).map(|i| (i % 251) as u8).collect();
        let control = ControlFileBuilder::new(512, "pool/data.bin")
            .version("0.6.2")
            .filename("data.bin")
            .mtime(std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_752_919_800))
            .weak_len(3)
            .strong_len(6)
            .build(&data);

        let mut encoded = Vec::new();
        control.encode(&mut encoded).expect("encode to Vec");
        let decoded = ControlFile::parse(encoded.as_slice()).expect("decode own encoding");
        assert_eq!(decoded, control);
    }
}
