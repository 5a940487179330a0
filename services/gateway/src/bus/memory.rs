use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{trace, warn};

use super::{ExecutionFeed, FeedError, OrderPublisher, PublishError};

#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// In-process publish/subscribe bus.
///
/// Stands in for the external bus when no endpoints are configured, and is
/// what tests publish into and capture from. Messages published while
/// nobody is subscribed are discarded.
pub struct MemoryBus {
    tx: broadcast::Sender<BusMessage>,
}

impl MemoryBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Feed of every payload published to `topic` from now on.
    pub fn subscribe(&self, topic: impl Into<String>) -> MemoryFeed {
        MemoryFeed {
            topic: topic.into(),
            rx: self.tx.subscribe(),
        }
    }

    pub fn send(&self, topic: &str, payload: Bytes) {
        let delivered = self
            .tx
            .send(BusMessage {
                topic: topic.to_string(),
                payload,
            })
            .unwrap_or(0);
        trace!(topic, delivered, "bus message sent");
    }
}

#[async_trait]
impl OrderPublisher for MemoryBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        self.send(topic, payload);
        Ok(())
    }
}

pub struct MemoryFeed {
    topic: String,
    rx: broadcast::Receiver<BusMessage>,
}

#[async_trait]
impl ExecutionFeed for MemoryFeed {
    async fn next_event(&mut self) -> Result<Bytes, FeedError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if msg.topic == self.topic => return Ok(msg.payload),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "feed subscriber lagged; events lost");
                }
                Err(RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }
}
