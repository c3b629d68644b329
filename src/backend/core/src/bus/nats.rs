//! NATS event bus.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{info, trace};

use super::{EventBus, Subscription};
use crate::error::{ErrorCode, GoodsError, Result};
use crate::telemetry::redact_url;

/// Event bus backed by a shared `async-nats` client.
///
/// The client is cheap to clone; producer and consumer share one connection.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to a NATS server.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url).await.map_err(|e| {
            GoodsError::with_internal(
                ErrorCode::EventBusUnavailable,
                "Failed to connect to NATS",
                e.to_string(),
            )
        })?;

        info!(url = %redact_url(url), "Connected to NATS");
        Ok(Self { client })
    }

    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        let size = payload.len();
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| {
                GoodsError::with_internal(
                    ErrorCode::EventBusUnavailable,
                    "Failed to publish to NATS",
                    e.to_string(),
                )
            })?;

        trace!(subject = subject, bytes = size, "Published");
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Subscription> {
        let subscriber = self.client.subscribe(subject.to_string()).await.map_err(|e| {
            GoodsError::with_internal(
                ErrorCode::EventBusUnavailable,
                "Failed to subscribe to NATS subject",
                e.to_string(),
            )
        })?;

        info!(subject = subject, "Subscribed");
        Ok(subscriber.map(|message| message.payload).boxed())
    }

    async fn flush(&self) -> Result<()> {
        self.client.flush().await.map_err(|e| {
            GoodsError::with_internal(
                ErrorCode::EventBusError,
                "Failed to flush NATS client",
                e.to_string(),
            )
        })
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}
