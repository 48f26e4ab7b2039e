//! Broadcast dispatcher: the single consumer of the message queue.

use std::sync::Arc;

use crate::{domain::UserRegistry, infrastructure::QueueConsumer};

/// Drains the queue and fans every message out through the registry.
///
/// Messages are handled one at a time in queue order, so broadcast order is
/// exactly enqueue order.
pub struct BroadcastDispatcher {
    registry: Arc<dyn UserRegistry>,
    consumer: QueueConsumer,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<dyn UserRegistry>, consumer: QueueConsumer) -> Self {
        Self { registry, consumer }
    }

    /// Run until every queue producer is gone.
    ///
    /// In a running server the registry keeps a producer alive, so this only
    /// returns at shutdown.
    pub async fn run(mut self) {
        tracing::info!("Broadcast dispatcher started");

        while let Some(message) = self.consumer.dequeue().await {
            let report = self.registry.fan_out(&message).await;
            tracing::debug!(
                "Broadcasted message from '{}' to {} member(s), {} failed",
                message.sender,
                report.delivered,
                report.failed
            );
        }

        tracing::info!("Message queue closed, broadcast dispatcher stopped");
    }
}
