//! In-memory sink.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::{EventSink, SinkRow};
use crate::error::{ErrorCode, GoodsError, Result};

/// Sink that appends committed batches to a vector.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<SinkRow>>,
    fail_next: AtomicU32,
    commits: AtomicU64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` batch writes fail without committing anything.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Rows committed so far, in commit order.
    pub fn rows(&self) -> Vec<SinkRow> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful batch writes.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn write_batch(&self, rows: &[SinkRow]) -> Result<()> {
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GoodsError::new(ErrorCode::SinkUnavailable, "Sink unavailable"));
        }

        self.rows.lock().extend_from_slice(rows);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
