//! Real-time order ingestion gateway.
//!
//! Clients hold a WebSocket open on `/ws/orders` and submit orders as JSON.
//! Each submission is checked against the trading halt switch, validated,
//! stamped with a server id and timestamp, retained in a bounded log,
//! published to the downstream ingestion topic and acknowledged. Accepted
//! orders, halt notices and execution events from the downstream feed are
//! fanned out to every connected client.
//!
//! ```text
//!  client ──► OrderPipeline ──► OrderLog
//!                 │   │
//!                 │   └──► IngestQueue ──► OrderPublisher ──► downstream
//!                 ▼
//!           ConnectionHub ◄── BroadcastRelay ◄── ExecutionFeed ◄── downstream
//!                 ▲
//!           AdmissionGate ◄── POST /admin/panic
//! ```

pub mod admission;
pub mod bus;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod models;
pub mod order_log;
pub mod pipeline;
pub mod relay;
pub mod router;
pub mod state;

pub use admission::AdmissionGate;
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use hub::{Connection, ConnectionHub};
pub use order_log::OrderLog;
pub use pipeline::OrderPipeline;
pub use relay::BroadcastRelay;
pub use router::{create_admin_router, create_router};
pub use state::AppState;
