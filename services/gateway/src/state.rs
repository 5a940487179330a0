use std::sync::Arc;

use crate::admission::AdmissionGate;
use crate::bus::{IngestQueue, OrderPublisher};
use crate::config::GatewayConfig;
use crate::hub::{BroadcastQueue, ConnectionHub};
use crate::order_log::OrderLog;
use crate::pipeline::OrderPipeline;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub gate: Arc<AdmissionGate>,
    pub order_log: Arc<OrderLog>,
    pub pipeline: Arc<OrderPipeline>,
    /// Outbound queue depth for each new connection
    pub outbound_buffer: usize,
}

impl AppState {
    /// Wire up the shared components and start the ingest publisher and the
    /// echo fan-out worker.
    ///
    /// Must be called inside a Tokio runtime. Both workers stop once every
    /// `AppState` clone is dropped.
    pub fn new(config: &GatewayConfig, publisher: Arc<dyn OrderPublisher>) -> Self {
        let hub = Arc::new(ConnectionHub::new(config.write_timeout()));
        let gate = Arc::new(AdmissionGate::new(hub.clone()));
        let order_log = Arc::new(OrderLog::new(config.order_log_capacity));
        let (ingest, _) =
            IngestQueue::spawn(publisher, config.ingest_topic.clone(), config.publish_buffer);
        let (echo, _) = BroadcastQueue::spawn(hub.clone(), config.broadcast_buffer);
        let pipeline = Arc::new(OrderPipeline::new(
            gate.clone(),
            order_log.clone(),
            hub.clone(),
            ingest,
            echo,
        ));

        Self {
            hub,
            gate,
            order_log,
            pipeline,
            outbound_buffer: config.outbound_buffer,
        }
    }
}
