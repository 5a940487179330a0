//! Forwards execution events from the external feed to every client.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

use crate::bus::{ExecutionFeed, FeedError};
use crate::hub::ConnectionHub;

pub struct BroadcastRelay<F> {
    feed: F,
    hub: Arc<ConnectionHub>,
}

impl<F: ExecutionFeed + 'static> BroadcastRelay<F> {
    pub fn new(feed: F, hub: Arc<ConnectionHub>) -> Self {
        Self { feed, hub }
    }

    /// Relay events verbatim until the feed ends. Returns why it ended.
    ///
    /// Reconnecting is the feed's business; once this returns the gateway
    /// keeps serving orders without live executions.
    pub async fn run(mut self) -> FeedError {
        info!("broadcast relay started");
        let mut relayed: u64 = 0;

        loop {
            match self.feed.next_event().await {
                Ok(payload) => {
                    let report = self.hub.broadcast(payload).await;
                    relayed += 1;
                    trace!(delivered = report.delivered, "execution event relayed");
                }
                Err(FeedError::Closed) => {
                    info!(relayed, "execution feed closed; broadcast relay stopped");
                    return FeedError::Closed;
                }
                Err(e) => {
                    error!(relayed, error = %e, "execution feed failed; broadcast relay stopped");
                    return e;
                }
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<FeedError> {
        tokio::spawn(self.run())
    }
}
