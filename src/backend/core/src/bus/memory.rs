//! In-process event bus.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

use super::{EventBus, Subscription};
use crate::error::{ErrorCode, GoodsError, Result};

/// Fan-out bus over unbounded channels.
#[derive(Default)]
pub struct InMemoryBus {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<Bytes>>>,
    offline: AtomicBool,
    published: AtomicU64,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a broker outage: publishes and subscribes fail while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Messages accepted so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GoodsError::new(
                ErrorCode::EventBusUnavailable,
                "Event bus unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        self.check_online()?;

        if let Some(mut senders) = self.subscribers.get_mut(subject) {
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Subscription> {
        self.check_online()?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .entry(subject.to_string())
            .or_default()
            .push(tx);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|payload| (payload, rx))
        });
        Ok(stream.boxed())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_per_subject() {
        let bus = InMemoryBus::new();
        let mut logs = bus.subscribe("goods.logs").await.unwrap();
        let mut other = bus.subscribe("other").await.unwrap();

        bus.publish("goods.logs", Bytes::from_static(b"a")).await.unwrap();
        bus.publish("goods.logs", Bytes::from_static(b"b")).await.unwrap();

        assert_eq!(logs.next().await.unwrap(), Bytes::from_static(b"a"));
        assert_eq!(logs.next().await.unwrap(), Bytes::from_static(b"b"));

        bus.publish("other", Bytes::from_static(b"c")).await.unwrap();
        assert_eq!(other.next().await.unwrap(), Bytes::from_static(b"c"));
    }

    #[tokio::test]
    async fn test_offline_rejects_publish() {
        let bus = InMemoryBus::new();
        bus.set_offline(true);
        let err = bus.publish("goods.logs", Bytes::new()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EventBusUnavailable);

        bus.set_offline(false);
        assert!(bus.publish("goods.logs", Bytes::new()).await.is_ok());
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let bus = InMemoryBus::new();
        let sub = bus.subscribe("goods.logs").await.unwrap();
        drop(sub);

        bus.publish("goods.logs", Bytes::from_static(b"x")).await.unwrap();
        assert!(bus.subscribers.get("goods.logs").unwrap().is_empty());
    }
}
