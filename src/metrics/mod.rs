//! Call counters and cumulative durations per named operation.
//!
//! Components that want to be measured hold a [`Metrics`] handle and wrap
//! their work with [`Metrics::measure`]. Every measured call under key `K`
//! produces two samples: `K-call` and either `K-success` or `K-error`.
//! Spaces in keys are replaced with `_`.
//!
//! Samples travel over a bounded channel to a single aggregating task that
//! exclusively owns the table, so recording never takes a lock on the
//! matching path. A disabled handle skips timing and sending entirely.
//!
//! Recording is a non-blocking `try_send` while the channel has room. Only
//! when the aggregator falls [`METRICS_CHANNEL_CAPACITY`] samples behind
//! does a recorder wait for a free slot. Samples are never dropped while
//! the collector is open, which keeps the counts exact at close.
//!
//! # Examples
//!
//! ```rust
//! use grdep::metrics::MetricsCollector;
//!
//! # async fn example() {
//! let collector = MetricsCollector::spawn();
//! let metrics = collector.handle();
//! let _ = metrics.measure("lookup", async { Ok::<_, ()>(42) }).await;
//!
//! let snapshot = collector.close().await;
//! assert_eq!(snapshot.get("lookup-call").map(|a| a.count), Some(1));
//! assert_eq!(snapshot.get("lookup-success").map(|a| a.count), Some(1));
//! # }
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Capacity of the sample channel.
pub const METRICS_CHANNEL_CAPACITY: usize = 1000;

/// How a measured call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call returned `Ok`.
    Success,
    /// The call returned `Err`, including "unmatched".
    Error,
}

impl Outcome {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Aggregated values for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    /// Number of samples
    pub count: u64,
    /// Sum of sample durations
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl Aggregate {
    fn add(&mut self, duration: Duration) {
        self.count += 1;
        self.duration += duration;
    }

    /// Cumulative duration in whole milliseconds.
    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Final key table, available after the collector is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetricsSnapshot {
    entries: BTreeMap<String, Aggregate>,
}

impl MetricsSnapshot {
    /// Visits every key in sorted order.
    pub fn walk(&self, mut f: impl FnMut(&str, &Aggregate)) {
        for (key, value) in &self.entries {
            f(key, value);
        }
    }

    /// Looks up a single key.
    pub fn get(&self, key: &str) -> Option<&Aggregate> {
        self.entries.get(key)
    }

    /// Iterates keys in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Aggregate)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
enum Message {
    Sample {
        key: String,
        outcome: Outcome,
        duration: Duration,
    },
    Close(oneshot::Sender<MetricsSnapshot>),
}

/// Cloneable recording handle.
///
/// The default value is disabled and records nothing.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    sender: Option<mpsc::Sender<Message>>,
}

impl Metrics {
    /// A handle that records nothing.
    pub const fn disabled() -> Self {
        Self {
            sender: None,
        }
    }

    /// Returns `true` if samples are sent to a collector.
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Records one sample under `key`.
    ///
    /// Waits only while the channel is full. Samples sent after the
    /// collector has been closed are dropped.
    pub async fn record(&self, key: &str, outcome: Outcome, duration: Duration) {
        let Some(sender) = &self.sender else {
            return;
        };
        let message = Message::Sample {
            key: key.replace(' ', "_"),
            outcome,
            duration,
        };
        let closed = match sender.try_send(message) {
            Ok(()) => false,
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::trace!(target: "metrics", "sample channel full, waiting");
                sender.send(message).await.is_err()
            }
            Err(mpsc::error::TrySendError::Closed(_)) => true,
        };
        if closed {
            tracing::trace!(target: "metrics", "collector closed, dropping sample for {key}");
        }
    }

    /// Awaits `fut` and records its duration and outcome under `key`.
    pub async fn measure<T, E, F>(&self, key: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.is_enabled() {
            return fut.await;
        }
        let start = Instant::now();
        let result = fut.await;
        let outcome = if result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Error
        };
        self.record(key, outcome, start.elapsed()).await;
        result
    }
}

/// Owner of the aggregating task.
#[derive(Debug)]
pub struct MetricsCollector {
    handle: Metrics,
    worker: Option<JoinHandle<()>>,
}

impl MetricsCollector {
    /// Starts the aggregating task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel(METRICS_CHANNEL_CAPACITY);
        let worker = tokio::spawn(aggregate(receiver));
        Self {
            handle: Metrics {
                sender: Some(sender),
            },
            worker: Some(worker),
        }
    }

    /// A collector that never records anything.
    pub const fn disabled() -> Self {
        Self {
            handle: Metrics::disabled(),
            worker: None,
        }
    }

    /// Spawns a collector when `enabled`, otherwise returns a disabled one.
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Self::spawn()
        } else {
            Self::disabled()
        }
    }

    /// Returns a recording handle.
    pub fn handle(&self) -> Metrics {
        self.handle.clone()
    }

    /// Flushes every sample sent so far and returns the final table.
    pub async fn close(mut self) -> MetricsSnapshot {
        let Some(sender) = self.handle.sender.take() else {
            return MetricsSnapshot::default();
        };
        let (reply, snapshot) = oneshot::channel();
        if sender.send(Message::Close(reply)).await.is_err() {
            return MetricsSnapshot::default();
        }
        let snapshot = snapshot.await.unwrap_or_default();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!(target: "metrics", "metrics worker failed: {e}");
            }
        }
        snapshot
    }
}

async fn aggregate(mut receiver: mpsc::Receiver<Message>) {
    let mut entries: BTreeMap<String, Aggregate> = BTreeMap::new();
    while let Some(message) = receiver.recv().await {
        match message {
            Message::Sample {
                key,
                outcome,
                duration,
            } => {
                entries.entry(format!("{key}-call")).or_default().add(duration);
                entries.entry(format!("{key}-{}", outcome.suffix())).or_default().add(duration);
            }
            Message::Close(reply) => {
                let _ = reply.send(MetricsSnapshot {
                    entries,
                });
                return;
            }
        }
    }
}
