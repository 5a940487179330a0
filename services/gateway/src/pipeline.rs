//! Per-message order submission handling.
//!
//! For each inbound frame on an order socket:
//!
//! ```text
//! halted? ──yes──► {"error":"TRADING HALTED"}
//!   │no
//! decode + validate ──fail──► {"error":"Invalid JSON"}
//!   │ok
//! enrich (id, timestamp, status=open)
//!   ├─► OrderLog.append
//!   ├─► IngestQueue.publish   (fire-and-forget)
//!   ├─► ack to the originator {"status":"received","order_id":..}
//!   └─► BroadcastQueue.push(order json)
//! ```
//!
//! Rejections keep the connection open. Only a failed write to the
//! originating connection is reported back to the socket loop. The echo is
//! fanned out by the broadcast worker, so a slow peer never holds up the
//! submitter's next order.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::order::{Order, OrderRequest, unix_nanos_now};

use crate::admission::AdmissionGate;
use crate::bus::IngestQueue;
use crate::error::GatewayError;
use crate::hub::{BroadcastQueue, Connection, ConnectionError, ConnectionHub};
use crate::models::{ErrorReply, OrderAck, to_payload};
use crate::order_log::OrderLog;

/// An order that made it past admission, with its serialized form.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub order: Order,
    pub payload: Bytes,
}

pub struct OrderPipeline {
    gate: Arc<AdmissionGate>,
    order_log: Arc<OrderLog>,
    hub: Arc<ConnectionHub>,
    ingest: IngestQueue,
    echo: BroadcastQueue,
}

impl OrderPipeline {
    pub fn new(
        gate: Arc<AdmissionGate>,
        order_log: Arc<OrderLog>,
        hub: Arc<ConnectionHub>,
        ingest: IngestQueue,
        echo: BroadcastQueue,
    ) -> Self {
        Self {
            gate,
            order_log,
            hub,
            ingest,
            echo,
        }
    }

    /// Admission check, decode, enrichment, retention and publish.
    ///
    /// Returns `TradingHalted` or `MalformedRequest` without touching any
    /// state. A publish failure is logged and does not fail admission.
    pub fn admit(&self, raw: &[u8]) -> Result<Admitted, GatewayError> {
        if self.gate.is_halted() {
            return Err(GatewayError::TradingHalted);
        }

        let request: OrderRequest = serde_json::from_slice(raw)
            .map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;
        let order = Order::admit(request, unix_nanos_now())
            .map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;
        let payload = to_payload(&order)?;

        self.order_log.append(order.clone());

        if let Err(e) = self.ingest.publish(payload.clone()) {
            warn!(order_id = %order.id, error = %e, "order not forwarded to ingestion");
        }

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            symbol = %order.symbol,
            side = ?order.side,
            price = %order.price,
            quantity = %order.quantity,
            "order accepted"
        );

        Ok(Admitted { order, payload })
    }

    /// Process one inbound frame from `origin` and answer it.
    ///
    /// `Err` means `origin` can no longer be written to and should be closed.
    /// A connection the hub has already dropped gets nothing admitted.
    pub async fn handle(&self, origin: &Connection, raw: &[u8]) -> Result<(), GatewayError> {
        if origin.is_closed() {
            return Err(ConnectionError::Closed(origin.id()).into());
        }

        match self.admit(raw) {
            Ok(admitted) => {
                let ack = to_payload(&OrderAck::received(admitted.order.id))?;
                let acked = self.hub.send_to(origin, ack).await;

                if let Err(e) = self.echo.push(admitted.payload).await {
                    warn!(order_id = %admitted.order.id, error = %e, "order not echoed");
                }

                acked?;
                Ok(())
            }
            Err(rejection) => {
                let Some(reason) = rejection.client_reason() else {
                    return Err(rejection);
                };
                debug!(connection_id = origin.id(), error = %rejection, "submission rejected");

                let reply = to_payload(&ErrorReply {
                    error: reason.to_string(),
                })?;
                self.hub.send_to(origin, reply).await?;
                Ok(())
            }
        }
    }
}
