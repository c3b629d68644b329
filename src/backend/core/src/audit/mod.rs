//! Audit trail of goods mutations.
//!
//! ```text
//! handler ──► AuditLogger ──publish──► EventBus ──subscribe──► LogConsumer ──► SinkWriter ──► EventSink
//! ```
//!
//! Publishing is best-effort: [`AuditLogger::publish`] returns a
//! [`Delivery`] rather than a `Result`, so a bus outage can never fail the
//! mutation that triggered it.

mod consumer;
mod logger;

pub use consumer::{ConsumerHandle, LogConsumer};
pub use logger::{AuditLogger, Delivery};
