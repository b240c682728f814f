//! Trait abstraction for line-oriented reads to enable testing

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

use crate::error::{LoggerError, Result};

/// Longest run of bytes without a newline before it is handed out as a line
pub const MAX_LINE_LEN: usize = 1024;

/// Bytes requested from the transport per read call
const READ_CHUNK_SIZE: usize = 256;

/// One line as received from the transport
///
/// Keeps the number of bytes that arrived on the wire next to the decoded
/// text. Invalid UTF-8 is replaced with U+FFFD during decoding, so the text
/// length can be larger than what was actually received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLine {
    text: String,
    byte_len: usize,
}

impl RawLine {
    /// Decode received bytes, replacing invalid UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            text: String::from_utf8_lossy(bytes).into_owned(),
            byte_len: bytes.len(),
        }
    }

    /// Decoded text, line terminator included
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bytes received for this line
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// True for a read that timed out without data
    pub fn is_empty(&self) -> bool {
        self.byte_len == 0
    }
}

impl From<&str> for RawLine {
    fn from(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }
}

impl From<String> for RawLine {
    fn from(text: String) -> Self {
        let byte_len = text.len();
        Self { text, byte_len }
    }
}

impl PartialEq<&str> for RawLine {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

/// Source of newline-delimited text lines
///
/// Both the preflight check and the capture loop consume lines through this
/// trait, one at a time, from a single task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineSource: Send {
    /// Read the next line, including its line terminator
    ///
    /// Returns an empty line when no complete line arrived within the
    /// source's read timeout.
    async fn read_line(&mut self) -> Result<RawLine>;

    /// Drop any input buffered before this call
    ///
    /// Best effort. Sources that cannot discard input return `Ok(())`.
    fn discard_buffered(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Splits any async byte stream into lines with a per-read timeout
///
/// Bytes of an incomplete line stay buffered across timeouts and across
/// cancelled reads, so a line is never torn in two by a slow sender.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    read_timeout: Duration,
}

impl<R> LineReader<R> {
    pub fn new(inner: R, read_timeout: Duration) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(MAX_LINE_LEN),
            read_timeout,
        }
    }

    /// Access the wrapped stream
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Number of bytes received but not yet returned as a line
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Forget the bytes of any incomplete line
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn take_line(&mut self) -> Option<RawLine> {
        let end = match self.buf.iter().position(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None if self.buf.len() >= MAX_LINE_LEN => self.buf.len(),
            None => return None,
        };
        let line: Vec<u8> = self.buf.drain(..end).collect();
        Some(RawLine::from_bytes(&line))
    }
}

impl<R> std::fmt::Debug for LineReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("buffered", &self.buf.len())
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R> LineSource for LineReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_line(&mut self) -> Result<RawLine> {
        let deadline = Instant::now() + self.read_timeout;

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match tokio::time::timeout_at(deadline, self.inner.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => return Ok(RawLine::default()),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(LoggerError::Serial("serial stream closed".to_string()));
                }
                let rest = std::mem::take(&mut self.buf);
                return Ok(RawLine::from_bytes(&rest));
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn discard_buffered(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }
}
