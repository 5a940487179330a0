//! Gateway configuration
//!
//! Every option is a command-line flag that also reads an environment
//! variable, so the same binary runs from a shell or a container.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Parser, Debug, Clone)]
#[command(name = "order-gateway")]
#[command(version)]
#[command(about = "Real-time order ingestion gateway", long_about = None)]
pub struct GatewayConfig {
    /// Client-facing listener (order WebSocket and health)
    #[arg(long, env = "GATEWAY_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Operator listener (halt switch, recent orders). Keep it private.
    #[arg(long, env = "GATEWAY_ADMIN_LISTEN", default_value = "127.0.0.1:8090")]
    pub admin_listen: SocketAddr,

    /// Number of recently admitted orders retained in memory
    #[arg(long, env = "ORDER_LOG_CAPACITY", default_value_t = 1000)]
    pub order_log_capacity: usize,

    /// Upper bound on a single send to one connection
    #[arg(long, env = "WRITE_TIMEOUT_MS", default_value_t = 2000)]
    pub write_timeout_ms: u64,

    /// Per-connection outbound queue depth
    #[arg(long, env = "OUTBOUND_BUFFER", default_value_t = 256)]
    pub outbound_buffer: usize,

    /// Order echoes waiting for fan-out before submitters have to wait
    #[arg(long, env = "BROADCAST_BUFFER", default_value_t = 1024)]
    pub broadcast_buffer: usize,

    /// Orders waiting for the ingestion publisher before new ones are dropped
    #[arg(long, env = "PUBLISH_BUFFER", default_value_t = 1024)]
    pub publish_buffer: usize,

    /// Request timeout for the HTTP ingestion publisher
    #[arg(long, env = "PUBLISH_TIMEOUT_MS", default_value_t = 5000)]
    pub publish_timeout_ms: u64,

    /// Base URL of the order ingestion endpoint; in-process bus when unset
    #[arg(long, env = "INGEST_URL")]
    pub ingest_url: Option<String>,

    #[arg(long, env = "INGEST_TOPIC", default_value = "orders.ingest")]
    pub ingest_topic: String,

    /// WebSocket URL of the trade execution feed; in-process bus when unset
    #[arg(long, env = "EXECUTION_FEED_URL")]
    pub feed_url: Option<String>,

    #[arg(long, env = "FEED_TOPIC", default_value = "trades.executed")]
    pub feed_topic: String,

    /// Fallback log filter when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order_log_capacity == 0 {
            return Err(ConfigError::Zero("order_log_capacity"));
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Zero("write_timeout_ms"));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Zero("outbound_buffer"));
        }
        if self.broadcast_buffer == 0 {
            return Err(ConfigError::Zero("broadcast_buffer"));
        }
        if self.publish_buffer == 0 {
            return Err(ConfigError::Zero("publish_buffer"));
        }
        if self.publish_timeout_ms == 0 {
            return Err(ConfigError::Zero("publish_timeout_ms"));
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            admin_listen: SocketAddr::from(([127, 0, 0, 1], 8090)),
            order_log_capacity: 1000,
            write_timeout_ms: 2000,
            outbound_buffer: 256,
            broadcast_buffer: 1024,
            publish_buffer: 1024,
            publish_timeout_ms: 5000,
            ingest_url: None,
            ingest_topic: "orders.ingest".to_string(),
            feed_url: None,
            feed_topic: "trades.executed".to_string(),
            log_level: "info".to_string(),
        }
    }
}
