//! JSONL reading operations.
//!
//! [`JsonlReader`] reads one record per line with line number tracking, and
//! [`read_jsonl_resilient`] loads a whole file while turning bad lines into
//! [`Warning`]s.

use crate::error::{Error, Result};
use crate::warning::Warning;
use serde::de::DeserializeOwned;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Lines longer than this are skipped rather than parsed.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// A non-blank line as returned by [`JsonlReader::next_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Line content with surrounding whitespace trimmed.
    Text(&'a str),
    /// The line ran past the length limit. Its content was discarded
    /// without being buffered.
    Oversized,
}

/// Async reader for JSONL (JSON Lines) data.
///
/// Blank lines are ignored but still counted, so line numbers reported in
/// errors and warnings match what an editor shows. At most
/// `max_line_bytes` of any line are held in memory.
pub struct JsonlReader<R> {
    reader: BufReader<R>,
    /// 1-based number of the last line read, 0 before any read.
    line_number: usize,
    max_line_bytes: usize,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given async reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_max_line_bytes(reader, MAX_LINE_BYTES)
    }

    /// Like [`JsonlReader::new`], with a custom line length limit in bytes.
    #[must_use]
    pub fn with_max_line_bytes(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            max_line_bytes,
            buf: Vec::new(),
        }
    }

    /// Returns the 1-based number of the last line read.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads one physical line into `buf`, newline excluded.
    ///
    /// Returns `Some(false)` when the line overflowed the limit, in which
    /// case the rest of it is consumed and dropped.
    async fn read_raw_line(&mut self) -> Result<Option<bool>> {
        self.buf.clear();
        let mut oversized = false;
        let mut started = false;
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            started = true;
            let (chunk, ends_line) = match available.iter().position(|&b| b == b'\n') {
                Some(end) => (&available[..end], true),
                None => (available, false),
            };
            if !oversized {
                if self.buf.len() + chunk.len() > self.max_line_bytes {
                    oversized = true;
                    self.buf.clear();
                } else {
                    self.buf.extend_from_slice(chunk);
                }
            }
            let used = chunk.len() + usize::from(ends_line);
            self.reader.consume(used);
            if ends_line {
                break;
            }
        }
        if !started {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(!oversized))
    }

    /// Reads the next non-blank line.
    ///
    /// Returns `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the underlying reader fails or the line is not
    /// valid UTF-8.
    pub async fn next_line(&mut self) -> Result<Option<Line<'_>>> {
        loop {
            match self.read_raw_line().await? {
                None => return Ok(None),
                Some(false) => return Ok(Some(Line::Oversized)),
                Some(true) if self.buf.trim_ascii().is_empty() => {}
                Some(true) => break,
            }
        }
        let text = std::str::from_utf8(&self.buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(Line::Text(text.trim())))
    }

    /// Reads and deserializes the next record.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` with the offending line number if the line does
    /// not deserialize into `T`, and `Error::InvalidFormat` if it is over
    /// the length limit.
    pub async fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let parsed = match self.next_line().await? {
            Some(Line::Text(line)) => Some(serde_json::from_str::<T>(line)),
            Some(Line::Oversized) => None,
            None => return Ok(None),
        };
        let line_number = self.line_number;
        match parsed {
            Some(parsed) => parsed
                .map(Some)
                .map_err(|source| Error::Json { line_number, source }),
            None => Err(Error::InvalidFormat(format!(
                "line {line_number} exceeds {} bytes",
                self.max_line_bytes
            ))),
        }
    }
}

/// Reads every record of a JSONL file, skipping lines that cannot be parsed.
///
/// Returns the records that parsed cleanly together with one [`Warning`] per
/// skipped line. Lines over [`MAX_LINE_BYTES`] are skipped without being
/// loaded. Only infrastructure failures (the file cannot be opened or read)
/// are errors.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened or read.
pub async fn read_jsonl_resilient<T, P>(path: P) -> Result<(Vec<T>, Vec<Warning>)>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref()).await?;
    let mut reader = JsonlReader::new(file);
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    loop {
        let parsed = match reader.next_line().await? {
            Some(Line::Text(line)) => Some(serde_json::from_str::<T>(line)),
            Some(Line::Oversized) => None,
            None => break,
        };
        let line_number = reader.line_number();
        match parsed {
            None => warnings.push(Warning::SkippedLine {
                line_number,
                reason: format!("line exceeds {MAX_LINE_BYTES} bytes"),
            }),
            Some(Ok(record)) => records.push(record),
            Some(Err(e)) => {
                tracing::debug!(line_number, error = %e, "Skipping malformed JSONL line");
                warnings.push(Warning::MalformedJson {
                    line_number,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok((records, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Cursor;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: u32,
    }

    #[tokio::test]
    async fn blank_lines_are_counted_but_skipped() {
        let mut reader = JsonlReader::new(Cursor::new(b"\n{\"id\":1}\n\n{\"id\":2}\n".to_vec()));

        assert_eq!(reader.read::<Row>().await.unwrap(), Some(Row { id: 1 }));
        assert_eq!(reader.line_number(), 2);
        assert_eq!(reader.read::<Row>().await.unwrap(), Some(Row { id: 2 }));
        assert_eq!(reader.line_number(), 4);
        assert_eq!(reader.read::<Row>().await.unwrap(), None);
    }

    #[tokio::test]
    async fn strict_read_reports_line_number() {
        let mut reader = JsonlReader::new(Cursor::new(b"{\"id\":1}\nnot json\n".to_vec()));

        reader.read::<Row>().await.unwrap();
        let err = reader.read::<Row>().await.unwrap_err();
        assert!(matches!(err, Error::Json { line_number: 2, .. }));
    }

    #[tokio::test]
    async fn long_line_is_dropped_without_buffering() {
        let mut input = b"{\"id\":1}\n".to_vec();
        input.extend(std::iter::repeat_n(b'x', 100_000));
        input.extend_from_slice(b"\n{\"id\":3}\n");
        let mut reader = JsonlReader::with_max_line_bytes(Cursor::new(input), 64);

        assert_eq!(reader.read::<Row>().await.unwrap(), Some(Row { id: 1 }));
        assert_eq!(reader.next_line().await.unwrap(), Some(Line::Oversized));
        assert_eq!(reader.line_number(), 2);
        assert!(reader.buf.capacity() <= 128);
        assert_eq!(reader.read::<Row>().await.unwrap(), Some(Row { id: 3 }));
        assert_eq!(reader.line_number(), 3);
    }

    #[tokio::test]
    async fn strict_read_rejects_long_line() {
        let input = Cursor::new(b"{\"id\":12345}\n".to_vec());
        let mut reader = JsonlReader::with_max_line_bytes(input, 8);

        let err = reader.read::<Row>().await.unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(msg) if msg.starts_with("line 1 ")));
    }

    #[tokio::test]
    async fn last_line_without_newline_is_read() {
        let mut reader = JsonlReader::new(Cursor::new(b"{\"id\":1}\n  {\"id\":2}  ".to_vec()));

        reader.read::<Row>().await.unwrap();
        assert_eq!(reader.next_line().await.unwrap(), Some(Line::Text("{\"id\":2}")));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn resilient_read_collects_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        tokio::fs::write(&path, "{\"id\":1}\n{broken\n{\"id\":3}\n")
            .await
            .unwrap();

        let (rows, warnings) = read_jsonl_resilient::<Row, _>(&path).await.unwrap();

        assert_eq!(rows, vec![Row { id: 1 }, Row { id: 3 }]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line_number(), 2);
        assert_eq!(warnings[0].kind(), "malformed_json");
    }

    #[tokio::test]
    async fn resilient_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_jsonl_resilient::<Row, _>(dir.path().join("absent.jsonl")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
