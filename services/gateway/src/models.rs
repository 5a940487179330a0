use bytes::Bytes;
use serde::{Deserialize, Serialize};
use types::ids::OrderId;

/// Acknowledgment sent only to the connection that submitted the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub status: String,
    pub order_id: OrderId,
}

impl OrderAck {
    pub fn received(order_id: OrderId) -> Self {
        Self {
            status: "received".to_string(),
            order_id,
        }
    }
}

/// Rejection sent back on the order socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Broadcast to every client whenever the halt switch flips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemNotice {
    #[serde(rename = "type")]
    pub kind: String,
    pub halted: bool,
}

impl SystemNotice {
    pub fn halt_changed(halted: bool) -> Self {
        Self {
            kind: "system".to_string(),
            halted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltResponse {
    pub halted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub trading_halted: bool,
    pub connections: usize,
    pub retained_orders: usize,
}

/// Serialize a wire message into a frame payload.
pub fn to_payload<T: Serialize>(message: &T) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(message).map(Bytes::from)
}
