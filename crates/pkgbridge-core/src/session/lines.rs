//! Line splitting that can also surface an unterminated tail

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 4096;

/// One unit read from a worker stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Chunk {
    /// A complete line, without its terminator
    Line(String),
    /// Bytes that arrived without a newline yet (e.g. a password prompt)
    Partial(String),
}

/// Splits a byte stream on `\n`, decoding lossily as UTF-8.
///
/// Elevation tools print their prompt without a newline, so an unterminated
/// tail is reported once as [`Chunk::Partial`] before the next read blocks.
/// The tail stays buffered until the caller either discards it with
/// [`discard_partial`](Self::discard_partial) or more bytes complete the line.
pub(crate) struct ChunkedLines<R> {
    reader: R,
    buf: Vec<u8>,
    eof: bool,
    tail_reported: bool,
}

impl<R: AsyncRead + Unpin> ChunkedLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            eof: false,
            tail_reported: false,
        }
    }

    pub async fn next_chunk(&mut self) -> io::Result<Option<Chunk>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                self.tail_reported = false;
                return Ok(Some(Chunk::Line(decode(&line[..pos]))));
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buf);
                return Ok(Some(Chunk::Line(decode(&rest))));
            }

            if !self.buf.is_empty() && !self.tail_reported {
                self.tail_reported = true;
                return Ok(Some(Chunk::Partial(decode(&self.buf))));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
                continue;
            }
            self.buf.extend_from_slice(&chunk[..n]);
            self.tail_reported = false;
        }
    }

    /// Drop the buffered unterminated tail
    pub fn discard_partial(&mut self) {
        self.buf.clear();
        self.tail_reported = false;
    }
}

fn decode(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_suffix('\r').unwrap_or(&*text).to_string()
}
