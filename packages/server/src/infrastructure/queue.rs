//! Bounded FIFO queue of messages waiting for broadcast.
//!
//! Many producers (session handlers and the registry's announcements), one
//! consumer (the broadcast dispatcher). Producers wait while the queue is
//! full, the consumer waits while it is empty. Blocked producers are admitted
//! in arrival order, and once a message is in the queue its position is fixed.

use tokio::sync::mpsc;

use crate::domain::{PendingMessage, QueueError};

/// Producer handle. Cheap to clone, one per producer.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    sender: mpsc::Sender<PendingMessage>,
}

/// The single consumer end of a [`MessageQueue`].
#[derive(Debug)]
pub struct QueueConsumer {
    receiver: mpsc::Receiver<PendingMessage>,
}

/// A reserved queue position that can be filled without waiting.
///
/// Dropping the slot without committing releases the position.
pub struct QueueSlot<'a> {
    permit: mpsc::Permit<'a, PendingMessage>,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` pending messages.
    ///
    /// A zero capacity is raised to one.
    pub fn bounded(capacity: usize) -> (Self, QueueConsumer) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, QueueConsumer { receiver })
    }

    /// Append `message` at the tail, waiting while the queue is full.
    pub async fn enqueue(&self, message: PendingMessage) -> Result<(), QueueError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| QueueError::Closed)
    }

    /// Wait for a free position without inserting anything yet.
    pub async fn reserve(&self) -> Result<QueueSlot<'_>, QueueError> {
        let permit = self.sender.reserve().await.map_err(|_| QueueError::Closed)?;
        Ok(QueueSlot { permit })
    }
}

impl QueueSlot<'_> {
    /// Insert `message` at the tail. Never waits.
    pub fn commit(self, message: PendingMessage) {
        self.permit.send(message);
    }
}

impl QueueConsumer {
    /// Remove and return the head, waiting while the queue is empty.
    ///
    /// Returns `None` once every producer handle is dropped and the queue is drained.
    pub async fn dequeue(&mut self) -> Option<PendingMessage> {
        self.receiver.recv().await
    }

    /// Remove the head if one is available, without waiting.
    pub fn try_dequeue(&mut self) -> Option<PendingMessage> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
