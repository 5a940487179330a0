//! Boundaries to the downstream order-processing system.
//!
//! The gateway publishes each admitted order to an ingestion topic and
//! consumes trade executions from a feed. Both are capabilities behind
//! traits so the pipeline and relay run the same way against a real
//! endpoint or the in-process bus.

mod http;
mod memory;
mod ws_feed;

pub use http::HttpPublisher;
pub use memory::{BusMessage, MemoryBus, MemoryFeed};
pub use ws_feed::WsFeed;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("ingest queue is full")]
    QueueFull,

    #[error("ingest queue is closed")]
    QueueClosed,

    #[error("ingest endpoint rejected the message with status {0}")]
    Rejected(u16),

    #[error("ingest transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum FeedError {
    /// Orderly end of the stream.
    #[error("execution feed closed")]
    Closed,

    #[error("execution feed transport error: {0}")]
    Transport(String),
}

/// Publishes a payload to a named topic on the downstream bus.
#[async_trait]
pub trait OrderPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError>;
}

/// A stream of opaque execution events.
#[async_trait]
pub trait ExecutionFeed: Send {
    /// Next event payload, or an error once the stream has ended.
    async fn next_event(&mut self) -> Result<Bytes, FeedError>;
}

#[async_trait]
impl<F: ExecutionFeed + ?Sized> ExecutionFeed for Box<F> {
    async fn next_event(&mut self) -> Result<Bytes, FeedError> {
        (**self).next_event().await
    }
}

/// Fire-and-forget handle the pipeline publishes admitted orders through.
///
/// `publish` never waits: it enqueues for a single worker task that forwards
/// to the `OrderPublisher` in admission order. Delivery is at most once.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<Bytes>,
}

impl IngestQueue {
    /// Start the worker publishing to `topic` and return the handle.
    pub fn spawn(
        publisher: Arc<dyn OrderPublisher>,
        topic: impl Into<String>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let topic = topic.into();
        let (tx, mut rx) = mpsc::channel::<Bytes>(capacity);

        let worker = tokio::spawn(async move {
            info!(topic = %topic, "ingest publisher started");
            while let Some(payload) = rx.recv().await {
                match publisher.publish(&topic, payload).await {
                    Ok(()) => debug!(topic = %topic, "order published"),
                    Err(e) => warn!(topic = %topic, error = %e, "order publish failed"),
                }
            }
            info!(topic = %topic, "ingest publisher stopped");
        });

        (Self { tx }, worker)
    }

    pub fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PublishError::QueueFull,
            TrySendError::Closed(_) => PublishError::QueueClosed,
        })
    }
}
