//! Consumer side of the audit trail: bus subscription feeding the sink writer.

use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::{EventBus, Subscription};
use crate::error::Result;
use crate::events::LogEvent;
use crate::sink::{FlushReport, SinkWriter, SinkWriterHandle};

/// The single subscriber of the audit subject.
pub struct LogConsumer;

impl LogConsumer {
    /// Subscribe to `subject` and forward every event to `writer`.
    ///
    /// Also starts the writer's flush timer; both are stopped together by
    /// [`ConsumerHandle::stop`].
    pub async fn start(
        bus: Arc<dyn EventBus>,
        subject: &str,
        writer: Arc<SinkWriter>,
    ) -> Result<ConsumerHandle> {
        let subscription = bus.subscribe(subject).await?;
        let writer_handle = writer.start();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(consume(subscription, writer, shutdown_rx));
        info!(subject = subject, bus = bus.name(), "Audit consumer started");

        Ok(ConsumerHandle {
            shutdown: shutdown_tx,
            task,
            writer: writer_handle,
        })
    }
}

async fn consume(
    mut subscription: Subscription,
    writer: Arc<SinkWriter>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut received = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            message = subscription.next() => match message {
                Some(payload) => {
                    received += 1;
                    forward(&writer, &payload).await;
                }
                None => {
                    warn!("Audit subscription closed by the bus");
                    return received;
                }
            },
        }
    }

    // hand over what the bus already delivered before unsubscribing
    while let Some(Some(payload)) = subscription.next().now_or_never() {
        received += 1;
        forward(&writer, &payload).await;
    }

    info!(received, "Audit consumer stopped");
    received
}

async fn forward(writer: &SinkWriter, payload: &[u8]) {
    let event = match LogEvent::decode(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, bytes = payload.len(), "Discarding malformed audit message");
            return;
        }
    };

    // a failed size-triggered flush keeps the event buffered
    let _ = writer.append(event).await;
}

/// Handle for stopping a running [`LogConsumer`].
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
    writer: SinkWriterHandle,
}

impl ConsumerHandle {
    pub fn writer(&self) -> &Arc<SinkWriter> {
        self.writer.writer()
    }

    /// Unsubscribe, stop the flush timer, then flush what is left.
    pub async fn stop(self) -> Result<FlushReport> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(received) => info!(received, "Audit subscription closed"),
            Err(e) => warn!(error = %e, "Audit consumer task ended abnormally"),
        }
        self.writer.stop().await
    }
}
