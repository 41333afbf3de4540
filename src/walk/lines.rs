//! Line-oriented streaming over any buffered reader.
//!
//! [`read_lines`] runs the scan on a blocking worker and publishes each
//! line to a bounded channel. A read error or cancellation is published as
//! one terminal item carrying the error, after which the channel closes, so
//! consumers can tell "exhausted" apart from "failed" or "cancelled".
//!
//! Lines are split on `\n`; a trailing `\r` is stripped and invalid UTF-8
//! is replaced rather than rejected. Line numbers start at 1.

use serde::Serialize;
use std::fmt;
use std::io::BufRead;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of line channels.
pub const LINE_CHANNEL_CAPACITY: usize = 1000;

/// Terminal error of a line stream.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The underlying reader failed.
    #[error("read failed: {0}")]
    Read(Arc<std::io::Error>),

    /// The cancellation token fired before the stream was exhausted.
    #[error("cancelled")]
    Cancelled,

    /// The walker's ignore chain failed with a hard error.
    #[error("ignore chain failed on {path}: {message}")]
    Ignore {
        /// Path being tested
        path: String,
        /// Error message of the chain
        message: String,
    },
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Read(Arc::new(e))
    }
}

/// One item of a line stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadLine {
    /// 1-based line number
    pub linum: usize,
    /// Line content without the line terminator
    pub text: String,
    /// Set only on the terminal item of a failed stream
    #[serde(skip)]
    pub err: Option<StreamError>,
}

impl ReadLine {
    /// Splits the item into its content or its terminal error.
    pub fn into_result(self) -> Result<Self, StreamError> {
        match self.err {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

impl fmt::Display for ReadLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.linum, self.text)
    }
}

/// How a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// The reader hit end of input.
    Exhausted,
    /// A read error was emitted as the terminal item.
    Failed,
    /// Cancellation was observed and emitted as the terminal item.
    Cancelled,
    /// The consumer went away.
    Closed,
}

/// Scans `reader` synchronously, passing every item to `emit`.
///
/// The token is checked before each line. `emit` returns `false` when the
/// consumer is gone, which stops the scan without a terminal item.
pub fn scan<R: BufRead>(
    mut reader: R,
    cancel: &CancellationToken,
    mut emit: impl FnMut(ReadLine) -> bool,
) -> ScanEnd {
    let mut buf = Vec::new();
    let mut linum = 0;
    loop {
        if cancel.is_cancelled() {
            emit(ReadLine {
                linum: linum + 1,
                text: String::new(),
                err: Some(StreamError::Cancelled),
            });
            return ScanEnd::Cancelled;
        }

        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return ScanEnd::Exhausted,
            Ok(_) => {
                linum += 1;
                let item = ReadLine {
                    linum,
                    text: decode_line(&buf),
                    err: None,
                };
                if !emit(item) {
                    return ScanEnd::Closed;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                emit(ReadLine {
                    linum: linum + 1,
                    text: String::new(),
                    err: Some(e.into()),
                });
                return ScanEnd::Failed;
            }
        }
    }
}

fn decode_line(buf: &[u8]) -> String {
    let mut line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Streams the lines of `reader` from a blocking worker.
///
/// Must be called from within a tokio runtime. The worker stops when the
/// stream ends, when `cancel` fires, or when the receiver is dropped.
pub fn read_lines<R>(reader: R, cancel: CancellationToken) -> mpsc::Receiver<ReadLine>
where
    R: BufRead + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let end = scan(reader, &cancel, |item| sender.blocking_send(item).is_ok());
        tracing::trace!(target: "walk::lines", "line stream ended: {end:?}");
    });
    receiver
}
