//! Producer side of the audit trail.

use serde::Serialize;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::bus::EventBus;
use crate::error::{GoodsError, Result};
use crate::events::{Action, LogEvent};
use crate::telemetry::PipelineMetrics;

/// Outcome of a best-effort audit publish.
#[must_use]
#[derive(Debug)]
pub enum Delivery {
    /// The bus accepted the event.
    Published,
    /// The event was not handed to the bus; the failure is already logged.
    Failed(GoodsError),
}

impl Delivery {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published)
    }

    pub fn error(&self) -> Option<&GoodsError> {
        match self {
            Self::Published => None,
            Self::Failed(e) => Some(e),
        }
    }
}

/// Publishes a [`LogEvent`] per committed mutation.
#[derive(Clone)]
pub struct AuditLogger {
    bus: Arc<dyn EventBus>,
    subject: String,
}

impl AuditLogger {
    pub fn new(bus: Arc<dyn EventBus>, subject: impl Into<String>) -> Self {
        Self {
            bus,
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Build and publish an event. Never fails the caller.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        action: Action,
        entity_id: i64,
        payload: &T,
    ) -> Delivery {
        match self.try_publish(action, entity_id, payload).await {
            Ok(()) => {
                PipelineMetrics::published(action.as_str());
                trace!(action = %action, entity_id, "Audit event published");
                Delivery::Published
            }
            Err(e) => {
                PipelineMetrics::publish_failed(action.as_str());
                warn!(
                    action = %action,
                    entity_id,
                    subject = %self.subject,
                    error = %e,
                    "Audit event not published"
                );
                Delivery::Failed(e)
            }
        }
    }

    async fn try_publish<T: Serialize + ?Sized>(
        &self,
        action: Action,
        entity_id: i64,
        payload: &T,
    ) -> Result<()> {
        let event = LogEvent::with_payload(action, entity_id, payload)?;
        self.bus.publish(&self.subject, event.encode()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = Arc::new(InMemoryBus::new());
        let mut sub = bus.subscribe("goods.logs").await.unwrap();
        let logger = AuditLogger::new(bus.clone(), "goods.logs");

        let delivery = logger
            .publish(Action::Create, 5, &serde_json::json!({"name": "a"}))
            .await;
        assert!(delivery.is_published());

        let event = LogEvent::decode(&sub.next().await.unwrap()).unwrap();
        assert_eq!(event.action, Action::Create);
        assert_eq!(event.entity_id, 5);
        assert_eq!(event.data["name"], "a");
    }

    #[tokio::test]
    async fn test_bus_outage_is_reported_not_raised() {
        let bus = Arc::new(InMemoryBus::new());
        bus.set_offline(true);
        let logger = AuditLogger::new(bus, "goods.logs");

        let delivery = logger.publish(Action::Delete, 1, &()).await;
        assert!(!delivery.is_published());
        assert!(delivery.error().is_some());
    }
}
