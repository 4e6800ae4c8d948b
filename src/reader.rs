//! Streaming reader for a top-level JSON array.
//!
//! The input is scanned byte by byte through a buffered reader. Only the
//! element currently being cut out is held in memory, so arrays far larger
//! than RAM can be replayed. Element boundaries are found by tracking open
//! brackets and string/escape state; each element's text is then validated with
//! `serde_json` and handed out verbatim.
//!
//! A malformed element is reported on its own and reading carries on with
//! the next one. Running out of input or an I/O failure ends the stream.

use crate::error::{Result, VolleyError};
use crate::request::Element;
use futures::stream::{self, Stream};
use serde::de::IgnoredAny;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Just past the opening bracket.
    First,
    /// Past at least one element slot; expecting `,` or `]`.
    Next,
    /// Closing bracket seen, input exhausted, or a fatal read error.
    Done,
}

/// Forward-only reader yielding the elements of a JSON array.
#[derive(Debug)]
pub struct ArrayReader<R> {
    inner: R,
    path: Option<PathBuf>,
    state: State,
    index: usize,
}

impl ArrayReader<BufReader<File>> {
    /// Open a file and consume its opening `[`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|source| VolleyError::InputFileRead {
                path: path.clone(),
                source,
            })?;

        Self::start(BufReader::with_capacity(READ_BUFFER_SIZE, file), Some(path)).await
    }
}

impl<R: AsyncBufRead + Unpin> ArrayReader<R> {
    /// Wrap an already-open buffered source and consume its opening `[`.
    pub async fn new(inner: R) -> Result<Self> {
        Self::start(inner, None).await
    }

    async fn start(inner: R, path: Option<PathBuf>) -> Result<Self> {
        let mut reader = Self {
            inner,
            path,
            state: State::First,
            index: 0,
        };

        match reader.peek_token().await? {
            Some(b'[') => {
                reader.inner.consume(1);
                Ok(reader)
            }
            Some(byte) => Err(VolleyError::DocumentParse {
                message: format!("expected '[' but found {}", describe(byte)),
            }),
            None => Err(VolleyError::DocumentParse {
                message: "input is empty".to_string(),
            }),
        }
    }

    /// Number of element slots read so far, malformed ones included.
    pub fn elements_read(&self) -> usize {
        self.index
    }

    /// Read the next element.
    ///
    /// Returns `None` once the closing bracket has been read. A
    /// [`VolleyError::ElementParse`] leaves the reader usable; any other
    /// error is the last item of the stream.
    pub async fn next_element(&mut self) -> Option<Result<Element>> {
        match self.advance().await {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => None,
            Err(e) => {
                if !e.is_element_error() {
                    self.state = State::Done;
                }
                Some(Err(e))
            }
        }
    }

    /// Turn the reader into a stream of elements.
    pub fn into_stream(self) -> impl Stream<Item = Result<Element>> {
        stream::unfold(self, |mut reader| async move {
            reader.next_element().await.map(|item| (item, reader))
        })
    }

    async fn advance(&mut self) -> Result<Option<Element>> {
        if self.state == State::Done {
            return Ok(None);
        }

        match self.peek_token().await? {
            None => {
                return Err(VolleyError::TruncatedInput {
                    elements: self.index,
                });
            }
            Some(b']') => {
                self.inner.consume(1);
                self.state = State::Done;
                return Ok(None);
            }
            Some(b',') if self.state == State::Next => self.inner.consume(1),
            Some(_) => {}
        }

        self.state = State::Next;
        let (raw, at_eof) = self.capture().await?;
        if at_eof && raw.is_empty() {
            return Err(VolleyError::TruncatedInput {
                elements: self.index,
            });
        }

        let index = self.index;
        self.index += 1;

        match serde_json::from_slice::<IgnoredAny>(&raw) {
            Ok(_) => Ok(Some(Element::new(index, raw))),
            Err(source) => Err(VolleyError::ElementParse { index, source }),
        }
    }

    /// Skip whitespace and peek at the next byte without consuming it.
    async fn peek_token(&mut self) -> Result<Option<u8>> {
        loop {
            let (inner, path) = (&mut self.inner, &self.path);
            let buf = match inner.fill_buf().await {
                Ok(buf) => buf,
                Err(source) => return Err(io_error(path, source)),
            };
            if buf.is_empty() {
                return Ok(None);
            }

            match buf.iter().position(|b| !is_json_whitespace(*b)) {
                Some(pos) => {
                    let byte = buf[pos];
                    inner.consume(pos);
                    return Ok(Some(byte));
                }
                None => {
                    let len = buf.len();
                    inner.consume(len);
                }
            }
        }
    }

    /// Collect one element's bytes up to (not including) the next top-level
    /// `,` or `]`. The flag is set when the input ended first.
    async fn capture(&mut self) -> Result<(Vec<u8>, bool)> {
        let mut raw = Vec::new();
        let mut scanner = Scanner::default();

        loop {
            let (inner, path) = (&mut self.inner, &self.path);
            let buf = match inner.fill_buf().await {
                Ok(buf) => buf,
                Err(source) => return Err(io_error(path, source)),
            };
            if buf.is_empty() {
                return Ok((trim_json_whitespace(raw), true));
            }

            if let Some(end) = scanner.find_end(buf) {
                raw.extend_from_slice(&buf[..end]);
                inner.consume(end);
                return Ok((trim_json_whitespace(raw), false));
            }

            raw.extend_from_slice(buf);
            let len = buf.len();
            inner.consume(len);
        }
    }
}

/// Boundary scanner state carried across buffer refills.
#[derive(Debug, Default)]
struct Scanner {
    /// Unclosed `{` and `[` of the current element, innermost last.
    open: Vec<u8>,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Position of the delimiter ending the current element, if in `chunk`.
    fn find_end(&mut self, chunk: &[u8]) -> Option<usize> {
        for (i, &byte) in chunk.iter().enumerate() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.open.push(byte),
                b',' | b']' if self.open.is_empty() => return Some(i),
                b'}' | b']' => self.close(byte),
                _ => {}
            }
        }
        None
    }

    /// Unwind to the opener matching `closer`, dropping any unclosed
    /// openers above it. A closer with no matching opener is ignored.
    fn close(&mut self, closer: u8) {
        let opener = if closer == b'}' { b'{' } else { b'[' };
        if let Some(pos) = self.open.iter().rposition(|&b| b == opener) {
            self.open.truncate(pos);
        }
    }
}

fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn trim_json_whitespace(mut raw: Vec<u8>) -> Vec<u8> {
    let end = raw
        .iter()
        .rposition(|b| !is_json_whitespace(*b))
        .map_or(0, |pos| pos + 1);
    raw.truncate(end);
    let start = raw
        .iter()
        .position(|b| !is_json_whitespace(*b))
        .unwrap_or(raw.len());
    raw.drain(..start);
    raw
}

fn describe(byte: u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}'", byte as char)
    } else {
        format!("byte 0x{byte:02x}")
    }
}

fn io_error(path: &Option<PathBuf>, source: std::io::Error) -> VolleyError {
    VolleyError::InputFileRead {
        path: path.clone().unwrap_or_else(|| PathBuf::from("<input>")),
        source,
    }
}
