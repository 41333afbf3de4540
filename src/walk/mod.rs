//! File tree traversal producing a stream of lines.
//!
//! The [`Walker`] performs a depth-first walk from a root, testing every
//! entry's path against the ignore [`MatcherChain`]. An ignored directory is
//! pruned with its whole subtree and an ignored file is skipped. Every
//! surviving regular file is opened and its lines are published, in line
//! order, to a bounded channel.
//!
//! Traversal is best-effort: walk errors on individual entries and files
//! that cannot be opened are logged and skipped. A read error in the middle
//! of a file ends that file with an error-carrying [`Line`] and the walk
//! moves on; deciding whether that aborts the run is left to the consumer.
//! A hard error from the ignore chain ends the whole walk with one
//! [`StreamError::Ignore`] line, since no later entry can be filtered
//! reliably.
//!
//! Entries are visited in file-name order, so repeated walks over an
//! unchanged tree produce the same sequence.

pub mod lines;

pub use lines::{LINE_CHANNEL_CAPACITY, ReadLine, ScanEnd, StreamError, read_lines};

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::matcher::{MatchError, MatcherChain};

/// One line of one walked file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Line {
    /// 1-based line number within the file
    pub linum: usize,
    /// Line content without the line terminator
    pub content: String,
    /// Path of the file as reached from the walk root
    pub path: String,
    /// Set only on the terminal item of a failed or cancelled stream
    #[serde(skip)]
    pub err: Option<StreamError>,
}

impl Line {
    fn from_read_line(path: &str, item: ReadLine) -> Self {
        Self {
            linum: item.linum,
            content: item.text,
            path: path.to_string(),
            err: item.err,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}:{}:{}", self.path, self.linum, self.content)
    }
}

/// Walks one root, skipping entries matched by an ignore chain.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    ignore: Arc<MatcherChain>,
}

impl Walker {
    /// Creates a walker for `root`.
    pub fn new(root: impl Into<PathBuf>, ignore: Arc<MatcherChain>) -> Self {
        Self {
            root: root.into(),
            ignore,
        }
    }

    /// Returns the root being walked.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts the walk on a blocking worker.
    ///
    /// Must be called from within a tokio runtime. Once `cancel` fires the
    /// stream yields one [`StreamError::Cancelled`] line and closes.
    pub fn walk(&self, cancel: CancellationToken) -> mpsc::Receiver<Line> {
        let (sender, receiver) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let walker = self.clone();
        let runtime = Handle::current();
        tokio::task::spawn_blocking(move || {
            walker.run(&runtime, &cancel, &sender);
            // release the ignore chain before the stream reports completion
            drop(walker);
            drop(sender);
        });
        receiver
    }

    fn run(&self, runtime: &Handle, cancel: &CancellationToken, sender: &mpsc::Sender<Line>) {
        debug!(target: "walk", "walking {}", self.root.display());
        let mut entries = WalkDir::new(&self.root).sort_by_file_name().into_iter();

        while let Some(entry) = entries.next() {
            if cancel.is_cancelled() {
                let _ = sender.blocking_send(Line {
                    path: self.root.display().to_string(),
                    err: Some(StreamError::Cancelled),
                    ..Line::default()
                });
                return;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(target: "walk", "skipping entry: {e}");
                    continue;
                }
            };

            let path = entry.path().to_string_lossy().to_string();
            let ignored = match self.is_ignored(runtime, &path) {
                Ok(ignored) => ignored,
                Err(e) => {
                    let _ = sender.blocking_send(Line {
                        path: path.clone(),
                        err: Some(StreamError::Ignore {
                            path,
                            message: e.to_string(),
                        }),
                        ..Line::default()
                    });
                    return;
                }
            };
            if ignored {
                trace!(target: "walk", "ignored {path}");
                if entry.file_type().is_dir() {
                    entries.skip_current_dir();
                }
                continue;
            }

            if !entry.path().is_file() {
                continue;
            }

            match scan_file(entry.path(), &path, cancel, sender) {
                ScanEnd::Exhausted | ScanEnd::Failed => {}
                ScanEnd::Cancelled | ScanEnd::Closed => return,
            }
        }
    }

    fn is_ignored(&self, runtime: &Handle, path: &str) -> Result<bool, MatchError> {
        match runtime.block_on(self.ignore.matches(path)) {
            Ok(_) => Ok(true),
            Err(e) if e.is_unmatched() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn scan_file(
    file_path: &Path,
    path: &str,
    cancel: &CancellationToken,
    sender: &mpsc::Sender<Line>,
) -> ScanEnd {
    let file = match File::open(file_path) {
        Ok(file) => file,
        Err(e) => {
            warn!(target: "walk", "cannot open {path}: {e}");
            return ScanEnd::Exhausted;
        }
    };
    lines::scan(BufReader::new(file), cancel, |item| {
        sender.blocking_send(Line::from_read_line(path, item)).is_ok()
    })
}
