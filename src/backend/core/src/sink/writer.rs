//! Batched, timer-driven writer in front of an [`EventSink`].
//!
//! The pending batch sits behind a single async mutex. Appends, size-triggered
//! flushes and timer flushes all take that lock and hold it across the sink
//! write, so they never run concurrently and a batch is never written twice.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::EventSink;
use crate::config::SinkConfig;
use crate::error::Result;
use crate::events::LogEvent;
use crate::telemetry::PipelineMetrics;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Rows committed to the sink
    pub written: usize,
    /// Events dropped because they could not be encoded
    pub skipped: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.written == 0 && self.skipped == 0
    }
}

/// Owner of the pending audit batch.
pub struct SinkWriter {
    sink: Arc<dyn EventSink>,
    batch: Mutex<Vec<LogEvent>>,
    batch_size: usize,
    flush_interval: Duration,
}

impl SinkWriter {
    pub fn new(sink: Arc<dyn EventSink>, batch_size: usize, flush_interval: Duration) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch: Mutex::new(Vec::with_capacity(batch_size)),
            batch_size,
            flush_interval,
        }
    }

    pub fn from_config(sink: Arc<dyn EventSink>, config: &SinkConfig) -> Self {
        Self::new(sink, config.batch_size, config.flush_interval)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Buffer an event, flushing first-hand once the batch is full.
    ///
    /// The event is buffered even when that flush fails; the error is
    /// returned so the caller can log it, and the next trigger retries.
    /// The batch has no upper bound: while the sink is down every append
    /// past `batch_size` retries the write and the backlog keeps growing.
    pub async fn append(&self, event: LogEvent) -> Result<()> {
        let mut batch = self.batch.lock().await;
        batch.push(event);
        PipelineMetrics::pending(batch.len());

        if batch.len() >= self.batch_size {
            if let Err(e) = self.flush_locked(&mut batch).await {
                if batch.len() % self.batch_size == 0 {
                    warn!(
                        sink = self.sink.name(),
                        pending = batch.len(),
                        batch_size = self.batch_size,
                        "Audit backlog growing while the sink is unavailable"
                    );
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Write every pending event in one transaction.
    ///
    /// The batch is cleared only after the sink commits; on failure it is
    /// left exactly as it was.
    pub async fn flush(&self) -> Result<FlushReport> {
        let mut batch = self.batch.lock().await;
        self.flush_locked(&mut batch).await
    }

    async fn flush_locked(&self, batch: &mut Vec<LogEvent>) -> Result<FlushReport> {
        if batch.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut rows = Vec::with_capacity(batch.len());
        let mut skipped = 0;
        for event in batch.iter() {
            match self.sink.encode(event) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        action = %event.action,
                        entity_id = event.entity_id,
                        error = %e,
                        "Dropping audit event that cannot be encoded"
                    );
                }
            }
        }

        if !rows.is_empty() {
            if let Err(e) = self.sink.write_batch(&rows).await {
                PipelineMetrics::flush_failed();
                error!(
                    sink = self.sink.name(),
                    pending = batch.len(),
                    error = %e,
                    "Sink flush failed; batch retained"
                );
                return Err(e);
            }
        }

        let report = FlushReport {
            written: rows.len(),
            skipped,
        };
        batch.clear();

        PipelineMetrics::flushed(report.written, report.skipped);
        PipelineMetrics::pending(0);
        debug!(
            sink = self.sink.name(),
            written = report.written,
            skipped = report.skipped,
            "Flushed audit batch"
        );
        Ok(report)
    }

    /// Number of events waiting for the next flush.
    pub async fn pending(&self) -> usize {
        self.batch.lock().await.len()
    }

    /// Spawn the periodic flush. The first tick fires one interval from now.
    pub fn start(self: &Arc<Self>) -> SinkWriterHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let writer = Arc::clone(self);
        let period = self.flush_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                sink = writer.sink.name(),
                batch_size = writer.batch_size,
                flush_interval = ?period,
                "Sink writer started"
            );

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        // failures are logged inside and retried on the next tick
                        let _ = writer.flush().await;
                    }
                }
            }

            info!(sink = writer.sink.name(), "Sink writer timer stopped");
        });

        SinkWriterHandle {
            shutdown: shutdown_tx,
            task,
            writer: Arc::clone(self),
        }
    }
}

/// Handle for controlling a running [`SinkWriter`] timer.
pub struct SinkWriterHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    writer: Arc<SinkWriter>,
}

impl SinkWriterHandle {
    pub fn writer(&self) -> &Arc<SinkWriter> {
        &self.writer
    }

    /// Stop the timer, then flush whatever is still pending.
    pub async fn stop(self) -> Result<FlushReport> {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sink writer timer task ended abnormally");
        }

        let report = self.writer.flush().await?;
        info!(written = report.written, "Final audit flush complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, GoodsError};
    use crate::events::Action;
    use crate::sink::{MemorySink, SinkRow};
    use async_trait::async_trait;

    fn event(id: i64) -> LogEvent {
        LogEvent::new(Action::Update, id, serde_json::json!({ "id": id }))
    }

    fn writer(sink: Arc<MemorySink>) -> Arc<SinkWriter> {
        Arc::new(SinkWriter::new(sink, 100, Duration::from_secs(5)))
    }

    /// Rejects events for negative entity ids at encode time.
    struct PickySink(MemorySink);

    #[async_trait]
    impl EventSink for PickySink {
        fn encode(&self, event: &LogEvent) -> Result<SinkRow> {
            if event.entity_id < 0 {
                return Err(GoodsError::new(ErrorCode::SerializationError, "unencodable"));
            }
            SinkRow::encode(event)
        }

        async fn write_batch(&self, rows: &[SinkRow]) -> Result<()> {
            self.0.write_batch(rows).await
        }

        fn name(&self) -> &'static str {
            "picky"
        }
    }

    #[tokio::test]
    async fn test_flushes_when_batch_fills() {
        let sink = Arc::new(MemorySink::new());
        let writer = writer(sink.clone());

        for id in 0..99 {
            writer.append(event(id)).await.unwrap();
        }
        assert!(sink.is_empty());
        assert_eq!(writer.pending().await, 99);

        writer.append(event(99)).await.unwrap();
        assert_eq!(sink.len(), 100);
        assert_eq!(sink.commits(), 1);
        assert_eq!(writer.pending().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_partial_batch() {
        let sink = Arc::new(MemorySink::new());
        let writer = writer(sink.clone());
        let handle = writer.start();

        writer.append(event(1)).await.unwrap();
        writer.append(event(2)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(sink.is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.len(), 2);
        assert_eq!(writer.pending().await, 0);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_commit_retains_batch() {
        let sink = Arc::new(MemorySink::new());
        let writer = writer(sink.clone());
        for id in 0..3 {
            writer.append(event(id)).await.unwrap();
        }

        sink.fail_next(1);
        assert!(writer.flush().await.is_err());
        assert_eq!(writer.pending().await, 3);
        assert!(sink.is_empty());

        let report = writer.flush().await.unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(writer.pending().await, 0);

        let ids: Vec<i64> = sink.rows().iter().map(|r| r.entity_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_size_flush_failure_keeps_event() {
        let sink = Arc::new(MemorySink::new());
        let writer = Arc::new(SinkWriter::new(sink.clone(), 2, Duration::from_secs(5)));

        writer.append(event(1)).await.unwrap();
        sink.fail_next(1);
        assert!(writer.append(event(2)).await.is_err());
        assert_eq!(writer.pending().await, 2);

        writer.append(event(3)).await.unwrap();
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn test_backlog_grows_during_outage_and_drains_on_recovery() {
        let sink = Arc::new(MemorySink::new());
        let writer = Arc::new(SinkWriter::new(sink.clone(), 10, Duration::from_secs(5)));

        sink.fail_next(u32::MAX);
        let mut failures = 0;
        for id in 0..45 {
            if writer.append(event(id)).await.is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 36);
        assert_eq!(writer.pending().await, 45);
        assert!(sink.is_empty());

        sink.fail_next(0);
        let report = writer.flush().await.unwrap();
        assert_eq!(report.written, 45);
        assert_eq!(sink.commits(), 1);
        assert_eq!(writer.pending().await, 0);
    }

    #[tokio::test]
    async fn test_unencodable_event_is_skipped() {
        let sink = Arc::new(PickySink(MemorySink::new()));
        let writer = SinkWriter::new(sink.clone(), 100, Duration::from_secs(5));

        writer.append(event(1)).await.unwrap();
        writer.append(event(-1)).await.unwrap();
        writer.append(event(2)).await.unwrap();

        let report = writer.flush().await.unwrap();
        assert_eq!(report, FlushReport { written: 2, skipped: 1 });
        assert_eq!(writer.pending().await, 0);

        let ids: Vec<i64> = sink.0.rows().iter().map(|r| r.entity_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_empty_flush_does_not_touch_sink() {
        let sink = Arc::new(MemorySink::new());
        let writer = writer(sink.clone());

        assert!(writer.flush().await.unwrap().is_empty());
        assert_eq!(sink.commits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flushes_everything() {
        let sink = Arc::new(MemorySink::new());
        let writer = writer(sink.clone());
        let handle = writer.start();

        for id in 0..42 {
            writer.append(event(id)).await.unwrap();
        }

        let report = handle.stop().await.unwrap();
        assert_eq!(report.written, 42);
        assert_eq!(writer.pending().await, 0);
        assert_eq!(sink.len(), 42);
    }

    #[tokio::test]
    async fn test_row_encoding() {
        let row = SinkRow::encode(&LogEvent::new(Action::Delete, 9, serde_json::Value::Null)).unwrap();
        assert_eq!(row.action, "delete");
        assert_eq!(row.entity_id, 9);
        assert_eq!(row.data, "null");
    }
}
