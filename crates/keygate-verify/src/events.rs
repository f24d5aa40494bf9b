//! Verification events.
//!
//! One [`VerificationEvent`] is emitted per evaluated request. Emission never
//! blocks the verdict: [`BatchedEventSink`] hands rows to a bounded channel and
//! a background task flushes them in batches, grouped by datasource.
//!
//! # Tiger Style
//!
//! - Bounded buffer: a full channel drops the row with a warning
//! - Fixed batch size per flush
//! - Uses CancellationToken for graceful shutdown, with a final flush

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::result::VerifyCode;

/// Record of one evaluated verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEvent {
    pub workspace_id: String,
    pub api_id: String,
    pub key_id: String,
    pub code: VerifyCode,
    /// Evaluation time (Unix milliseconds).
    pub time_ms: u64,
}

/// Receiver of verification events. Must return without waiting.
pub trait VerificationEventSink: Send + Sync {
    fn emit(&self, event: VerificationEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl VerificationEventSink for NoopEventSink {
    fn emit(&self, _event: VerificationEvent) {}
}

/// Failure reported by an [`EventFlusher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestError {
    pub reason: String,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ingest failed: {}", self.reason)
    }
}

impl std::error::Error for IngestError {}

/// Destination of flushed batches.
#[async_trait]
pub trait EventFlusher: Send + Sync {
    /// Deliver every row buffered for one datasource.
    async fn ingest(&self, datasource: &str, rows: Vec<serde_json::Value>) -> Result<(), IngestError>;
}

/// Flusher that writes each batch to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventFlusher;

#[async_trait]
impl EventFlusher for TracingEventFlusher {
    async fn ingest(&self, datasource: &str, rows: Vec<serde_json::Value>) -> Result<(), IngestError> {
        info!(datasource, rows = rows.len(), "verification events flushed");
        for row in &rows {
            debug!(datasource, %row, "verification event");
        }
        Ok(())
    }
}

/// Configuration for [`BatchedEventSink`].
#[derive(Debug, Clone)]
pub struct EventBatchConfig {
    /// Rows per flush.
    pub batch_size: usize,
    /// Channel capacity; rows beyond it are dropped.
    pub buffer_size: usize,
    /// Maximum time a row waits before being flushed.
    pub flush_interval: Duration,
    /// Datasource verification events are filed under.
    pub datasource: String,
}

impl Default for EventBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            buffer_size: 10_000,
            flush_interval: Duration::from_secs(1),
            datasource: "key_verifications".to_string(),
        }
    }
}

#[derive(Debug)]
struct EventRow {
    datasource: String,
    row: serde_json::Value,
}

/// Non-blocking, batching event sink.
pub struct BatchedEventSink {
    tx: mpsc::Sender<EventRow>,
    datasource: String,
    dropped: AtomicU64,
}

impl BatchedEventSink {
    /// Start the flush loop. It stops after a final flush once `cancel` fires.
    pub fn spawn(
        config: EventBatchConfig,
        flusher: Arc<dyn EventFlusher>,
        cancel: CancellationToken,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
        let sink = Arc::new(Self {
            tx,
            datasource: config.datasource.clone(),
            dropped: AtomicU64::new(0),
        });
        let handle = tokio::spawn(run_flush_loop(rx, config, flusher, cancel));
        (sink, handle)
    }

    /// Buffer an arbitrary row under `datasource`.
    pub fn buffer(&self, datasource: impl Into<String>, row: serde_json::Value) {
        let row = EventRow {
            datasource: datasource.into(),
            row,
        };
        match self.tx.try_send(row) {
            Ok(()) => {}
            Err(TrySendError::Full(row)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(datasource = %row.datasource, "event buffer full, dropping row");
            }
            Err(TrySendError::Closed(row)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(datasource = %row.datasource, "event sink stopped, dropping row");
            }
        }
    }

    /// Rows dropped because the buffer was full or the loop had stopped.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl VerificationEventSink for BatchedEventSink {
    fn emit(&self, event: VerificationEvent) {
        match serde_json::to_value(&event) {
            Ok(row) => self.buffer(self.datasource.clone(), row),
            Err(e) => warn!(error = %e, "verification event not serializable"),
        }
    }
}

async fn run_flush_loop(
    mut rx: mpsc::Receiver<EventRow>,
    config: EventBatchConfig,
    flusher: Arc<dyn EventFlusher>,
    cancel: CancellationToken,
) {
    let batch_size = config.batch_size.max(1);
    let mut batch: Vec<EventRow> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(config.flush_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!(
        batch_size,
        buffer_size = config.buffer_size,
        flush_interval_ms = config.flush_interval.as_millis() as u64,
        "event flush loop started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                rx.close();
                while let Some(row) = rx.recv().await {
                    batch.push(row);
                    if batch.len() >= batch_size {
                        flush(flusher.as_ref(), std::mem::take(&mut batch)).await;
                    }
                }
                flush(flusher.as_ref(), std::mem::take(&mut batch)).await;
                debug!("event flush loop shutting down");
                break;
            }
            maybe_row = rx.recv() => match maybe_row {
                Some(row) => {
                    batch.push(row);
                    if batch.len() >= batch_size {
                        flush(flusher.as_ref(), std::mem::take(&mut batch)).await;
                    }
                }
                None => {
                    flush(flusher.as_ref(), std::mem::take(&mut batch)).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush(flusher.as_ref(), std::mem::take(&mut batch)).await;
            }
        }
    }
}

async fn flush(flusher: &dyn EventFlusher, batch: Vec<EventRow>) {
    if batch.is_empty() {
        return;
    }
    let mut by_datasource: BTreeMap<String, Vec<serde_json::Value>> = BTreeMap::new();
    for EventRow { datasource, row } in batch {
        by_datasource.entry(datasource).or_default().push(row);
    }
    for (datasource, rows) in by_datasource {
        let count = rows.len();
        if let Err(e) = flusher.ingest(&datasource, rows).await {
            warn!(datasource = %datasource, rows = count, error = %e, "error ingesting events");
        }
    }
}
