#![allow(clippy::result_large_err)]
//! # Goods Core
//!
//! Project-scoped goods with a stable priority order, served over HTTP.
//!
//! ## Architecture
//!
//! - **Reorder**: pure planner deciding which siblings shift on a move
//! - **Repository**: PostgreSQL (serializable transactions) or in-memory store
//! - **Cache**: read-through per-good cache on Redis or in memory
//! - **Audit**: one event per mutation, published on NATS and batched into a sink table
//! - **API**: Axum REST handlers with structured `{code, message, details}` errors
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod api;
pub mod audit;
pub mod bus;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod goods;
pub mod reorder;
pub mod repository;
pub mod service;
pub mod sink;
pub mod telemetry;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, GoodsError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::audit::{AuditLogger, Delivery, LogConsumer};
    pub use crate::bus::{EventBus, InMemoryBus, NatsBus};
    pub use crate::cache::{GoodsCache, InMemoryBackend, RedisBackend};
    pub use crate::error::{ErrorCode, GoodsError, Result};
    pub use crate::events::{Action, LogEvent};
    pub use crate::goods::{Good, GoodCreate, GoodUpdate, GoodsPage, ListParams};
    pub use crate::repository::{GoodsRepository, InMemoryGoodsRepository, PgGoodsRepository};
    pub use crate::service::{GoodsService, Mutation, RetryPolicy};
    pub use crate::sink::{EventSink, MemorySink, SinkWriter, SqlSink};
}
