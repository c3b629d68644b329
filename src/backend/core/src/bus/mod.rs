//! Publish/subscribe transport between producers and the sink consumer.
//!
//! - **NatsBus**: core NATS subjects via `async-nats`
//! - **InMemoryBus**: process-local fan-out for single-binary runs and tests
//!
//! Delivery is fire-and-forget at the publisher: messages published while
//! nobody is subscribed are dropped, as with core NATS.

mod memory;
mod nats;

pub use memory::InMemoryBus;
pub use nats::NatsBus;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

/// Raw payloads received on a subject.
pub type Subscription = BoxStream<'static, Bytes>;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one message.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()>;

    /// Start receiving messages published on `subject`.
    ///
    /// Dropping the returned stream ends the subscription.
    async fn subscribe(&self, subject: &str) -> Result<Subscription>;

    /// Push buffered publishes to the server.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get the bus name.
    fn name(&self) -> &'static str;
}
