//! Analytical sink for audit events.
//!
//! [`SinkWriter`] owns the pending batch and decides when to flush;
//! an [`EventSink`] only knows how to write one batch atomically.
//!
//! - **SqlSink**: parameterized inserts inside one PostgreSQL transaction
//! - **MemorySink**: keeps committed rows in memory

mod memory;
mod postgres;
mod writer;

pub use memory::MemorySink;
pub use postgres::SqlSink;
pub use writer::{FlushReport, SinkWriter, SinkWriterHandle};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::events::LogEvent;

/// One row of the sink table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRow {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub entity_id: i64,
    /// Payload serialized as JSON text
    pub data: String,
}

impl SinkRow {
    /// Encode an event with its payload as JSON text.
    pub fn encode(event: &LogEvent) -> Result<Self> {
        Ok(Self {
            action: event.action.as_str().to_string(),
            timestamp: event.timestamp,
            entity_id: event.entity_id,
            data: serde_json::to_string(&event.data)?,
        })
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Turn an event into a row. An error drops that event only.
    fn encode(&self, event: &LogEvent) -> Result<SinkRow> {
        SinkRow::encode(event)
    }

    /// Write every row in one atomic transaction.
    ///
    /// On error nothing from `rows` may be visible in the sink.
    async fn write_batch(&self, rows: &[SinkRow]) -> Result<()>;

    /// Get the sink name.
    fn name(&self) -> &'static str;
}
